//! Name-based signal lookup seam
//!
//! Consumers that only need "give me the signal called X" depend on this
//! trait instead of a concrete file type, so they can be driven by an
//! opened MF4 file or by an in-memory stand-in.

use crate::reader::Mf4File;
use crate::types::{Result, Signal};
use std::io::{Read, Seek};

/// Anything that can look up a decoded signal by name
pub trait SignalSource {
    /// Fetch the signal called `name`
    ///
    /// Returns [`crate::DecoderError::SignalNotFound`] when no channel has
    /// that name, or another decoder error when the channel cannot be read.
    fn signal(&mut self, name: &str) -> Result<Signal>;
}

impl<R: Read + Seek> SignalSource for Mf4File<R> {
    fn signal(&mut self, name: &str) -> Result<Signal> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{ChannelData, Mf4Writer};
    use crate::DecoderError;
    use std::io::Cursor;

    fn lookup<S: SignalSource>(source: &mut S, name: &str) -> Result<Signal> {
        source.signal(name)
    }

    #[test]
    fn test_mf4_file_as_signal_source() {
        let mut writer = Mf4Writer::new();
        writer.add_group(vec![0.0, 1.0], vec![ChannelData::new("SOC", vec![81.0, 80.5]).with_unit("%")]);
        let mut file = Mf4File::from_reader(Cursor::new(writer.to_bytes().unwrap())).unwrap();

        let soc = lookup(&mut file, "SOC").unwrap();
        assert_eq!(soc.samples, vec![81.0, 80.5]);
        assert!(matches!(lookup(&mut file, "SOCMin"), Err(DecoderError::SignalNotFound(_))));
    }
}
