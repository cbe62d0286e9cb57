//! MF4 Decoder Library
//!
//! A small, reusable reader for ASAM MDF4 (`.mf4`) measurement files.
//!
//! # Architecture
//!
//! The library is intentionally narrow:
//! - Validates the identification and header blocks and indexes channels
//! - Reads a channel by name into physical values with its time base
//! - Applies the numeric `##CC` conversions (linear, rational, tables)
//! - Writes minimal MF4 files (float64 channels) for fixtures and exports
//!
//! The library does NOT:
//! - Decompress `##DZ` data blocks
//! - Decode bus logging frames (CAN, LIN, ...)
//! - Plot, summarize, or otherwise interpret signals
//!
//! All higher-level functionality is in the application layer (mf4-visualizer).
//!
//! # Example Usage
//!
//! ```no_run
//! use mf4_decoder::{Mf4File, SignalSource};
//! use std::path::Path;
//!
//! let mut file = Mf4File::open(Path::new("mf4_logfiles/test1.mf4")).unwrap();
//! for name in file.channel_names() {
//!     println!("channel: {}", name);
//! }
//!
//! let signal = file.signal("CellVMax").unwrap();
//! println!("{} samples [{}]", signal.len(), signal.unit.as_deref().unwrap_or("-"));
//! ```

// Public modules
pub mod reader;
pub mod source;
pub mod types;
pub mod writer;

// Re-export main types for convenience
pub use conversion::Conversion;
pub use reader::{ChannelInfo, Mf4File};
pub use source::SignalSource;
pub use types::{DecoderError, Result, Signal, Timestamp};
pub use writer::{ChannelData, Mf4Writer};

// Internal modules (not exposed in public API)
mod blocks;
mod conversion;
mod record;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension of MF4 measurement files (without the dot)
pub const MF4_EXTENSION: &str = "mf4";
