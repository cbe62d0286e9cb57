//! Minimal MF4 writer
//!
//! Writes finalized MDF 4.10 files with one sorted data group per added
//! group: a float64 time master channel followed by float64 value channels.
//! This is enough to produce test fixtures and small exports that any MDF4
//! tool can read back.

use crate::blocks::{BLOCK_HEADER_SIZE, ID_BLOCK_SIZE};
use crate::types::{DecoderError, Result, Timestamp};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const PROGRAM_ID: &[u8; 8] = b"mf4dec  ";
const MDF_VERSION: u16 = 410;
const HD_LINK_COUNT: usize = 6;
const HD_DATA_SIZE: usize = 32;

/// One value channel to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelData {
    pub name: String,
    pub unit: Option<String>,
    pub samples: Vec<f64>,
}

impl ChannelData {
    pub fn new(name: impl Into<String>, samples: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            unit: None,
            samples,
        }
    }

    /// Builder method: set the channel unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

#[derive(Debug, Clone)]
struct GroupData {
    timestamps: Vec<f64>,
    channels: Vec<ChannelData>,
}

/// Builder for MF4 files
#[derive(Debug, Clone, Default)]
pub struct Mf4Writer {
    start_time_ns: u64,
    groups: Vec<GroupData>,
}

impl Mf4Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the measurement start time stored in the header
    pub fn with_start_time(mut self, start: Timestamp) -> Self {
        self.start_time_ns = start.timestamp_nanos_opt().unwrap_or_default().max(0) as u64;
        self
    }

    /// Add a channel group sharing one time base (in seconds)
    pub fn add_group(&mut self, timestamps: Vec<f64>, channels: Vec<ChannelData>) -> &mut Self {
        self.groups.push(GroupData {
            timestamps,
            channels,
        });
        self
    }

    /// Serialize the file into memory
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        for group in &self.groups {
            for channel in &group.channels {
                if channel.samples.len() != group.timestamps.len() {
                    return Err(DecoderError::InvalidData(format!(
                        "channel '{}' has {} samples for {} timestamps",
                        channel.name,
                        channel.samples.len(),
                        group.timestamps.len()
                    )));
                }
            }
        }

        let mut buf = Vec::new();
        write_id_block(&mut buf)?;

        // header block is patched in once the first data group is known
        let hd_size = BLOCK_HEADER_SIZE as usize + HD_LINK_COUNT * 8 + HD_DATA_SIZE;
        buf.resize(buf.len() + hd_size, 0);

        // groups are written back to front so every `next` link is known
        let mut next_dg = 0u64;
        for group in self.groups.iter().rev() {
            next_dg = write_group(&mut buf, group, next_dg)?;
        }

        let mut header = Vec::with_capacity(hd_size);
        let mut hd_data = Vec::with_capacity(HD_DATA_SIZE);
        hd_data.write_u64::<LittleEndian>(self.start_time_ns)?;
        hd_data.write_i16::<LittleEndian>(0)?; // tz offset
        hd_data.write_i16::<LittleEndian>(0)?; // dst offset
        hd_data.write_u8(0)?; // time flags: UTC
        hd_data.write_u8(0)?; // time class
        hd_data.write_u8(0)?; // flags
        hd_data.write_u8(0)?;
        hd_data.write_f64::<LittleEndian>(0.0)?;
        hd_data.write_f64::<LittleEndian>(0.0)?;
        push_block(&mut header, b"##HD", &[next_dg, 0, 0, 0, 0, 0], &hd_data)?;
        let hd_start = ID_BLOCK_SIZE as usize;
        buf[hd_start..hd_start + header.len()].copy_from_slice(&header);

        Ok(buf)
    }

    /// Write the file to disk
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&bytes)?;
        out.flush()?;
        log::debug!("Wrote MF4 file {:?} ({} bytes)", path, bytes.len());
        Ok(())
    }
}

fn write_id_block(buf: &mut Vec<u8>) -> Result<()> {
    buf.extend_from_slice(b"MDF     ");
    buf.extend_from_slice(b"4.10    ");
    buf.extend_from_slice(PROGRAM_ID);
    buf.extend_from_slice(&[0u8; 4]);
    buf.write_u16::<LittleEndian>(MDF_VERSION)?;
    buf.extend_from_slice(&[0u8; 30]);
    buf.write_u16::<LittleEndian>(0)?; // unfinalized flags
    buf.write_u16::<LittleEndian>(0)?; // custom unfinalized flags
    Ok(())
}

/// Append an 8-byte aligned block and return its address
fn push_block(buf: &mut Vec<u8>, id: &[u8; 4], links: &[u64], data: &[u8]) -> Result<u64> {
    let address = buf.len() as u64;
    let length = BLOCK_HEADER_SIZE + links.len() as u64 * 8 + data.len() as u64;

    buf.extend_from_slice(id);
    buf.write_u32::<LittleEndian>(0)?;
    buf.write_u64::<LittleEndian>(length)?;
    buf.write_u64::<LittleEndian>(links.len() as u64)?;
    for link in links {
        buf.write_u64::<LittleEndian>(*link)?;
    }
    buf.extend_from_slice(data);

    let padding = (8 - buf.len() % 8) % 8;
    buf.resize(buf.len() + padding, 0);
    Ok(address)
}

fn push_text(buf: &mut Vec<u8>, text: &str) -> Result<u64> {
    let mut data = text.as_bytes().to_vec();
    data.push(0);
    push_block(buf, b"##TX", &[], &data)
}

fn write_group(buf: &mut Vec<u8>, group: &GroupData, next_dg: u64) -> Result<u64> {
    let channel_count = group.channels.len() + 1;
    let record_size = channel_count * 8;

    let mut records = Vec::with_capacity(record_size * group.timestamps.len());
    for (row, t) in group.timestamps.iter().enumerate() {
        records.write_f64::<LittleEndian>(*t)?;
        for channel in &group.channels {
            records.write_f64::<LittleEndian>(channel.samples[row])?;
        }
    }
    let data_addr = push_block(buf, b"##DT", &[], &records)?;

    // (name, unit, cn_type, sync_type) for the master followed by the values
    let mut specs: Vec<(&str, Option<&str>, u8, u8)> = vec![("time", Some("s"), 2, 1)];
    specs.extend(
        group
            .channels
            .iter()
            .map(|c| (c.name.as_str(), c.unit.as_deref(), 0u8, 0u8)),
    );

    let mut next_cn = 0u64;
    for (index, (name, unit, cn_type, sync_type)) in specs.iter().enumerate().rev() {
        let name_addr = push_text(buf, name)?;
        let unit_addr = match unit {
            Some(unit) => push_text(buf, unit)?,
            None => 0,
        };

        let mut data = Vec::with_capacity(72);
        data.write_u8(*cn_type)?;
        data.write_u8(*sync_type)?;
        data.write_u8(4)?; // IEEE float, little endian
        data.write_u8(0)?; // bit offset
        data.write_u32::<LittleEndian>((index * 8) as u32)?; // byte offset
        data.write_u32::<LittleEndian>(64)?; // bit count
        data.write_u32::<LittleEndian>(0)?; // flags
        data.write_u32::<LittleEndian>(0)?; // invalidation bit position
        data.write_u8(0)?; // precision
        data.write_u8(0)?;
        data.write_u16::<LittleEndian>(0)?; // attachment count
        for _ in 0..6 {
            data.write_f64::<LittleEndian>(0.0)?; // value range and limits
        }

        next_cn = push_block(
            buf,
            b"##CN",
            &[next_cn, 0, name_addr, 0, 0, 0, unit_addr, 0],
            &data,
        )?;
    }

    let mut cg_data = Vec::with_capacity(32);
    cg_data.write_u64::<LittleEndian>(0)?; // record id
    cg_data.write_u64::<LittleEndian>(group.timestamps.len() as u64)?;
    cg_data.write_u16::<LittleEndian>(0)?; // flags
    cg_data.write_u16::<LittleEndian>(0)?; // path separator
    cg_data.write_u32::<LittleEndian>(0)?;
    cg_data.write_u32::<LittleEndian>(record_size as u32)?;
    cg_data.write_u32::<LittleEndian>(0)?; // invalidation bytes
    let cg_addr = push_block(buf, b"##CG", &[0, next_cn, 0, 0, 0, 0], &cg_data)?;

    let dg_data = [0u8; 8]; // record id size 0 + reserved
    push_block(buf, b"##DG", &[next_dg, cg_addr, data_addr, 0], &dg_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Mf4File;
    use chrono::TimeZone;
    use std::io::Cursor;

    #[test]
    fn test_blocks_are_aligned() {
        let mut writer = Mf4Writer::new();
        writer.add_group(vec![0.0], vec![ChannelData::new("SOC", vec![80.0]).with_unit("%")]);
        let bytes = writer.to_bytes().unwrap();
        assert_eq!(bytes.len() % 8, 0);
        assert_eq!(&bytes[0..8], b"MDF     ");
        assert_eq!(&bytes[64..68], b"##HD");
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let mut writer = Mf4Writer::new();
        writer.add_group(vec![0.0, 1.0], vec![ChannelData::new("SOC", vec![80.0])]);
        assert!(matches!(writer.to_bytes(), Err(DecoderError::InvalidData(_))));
    }

    #[test]
    fn test_start_time_stored_in_header() {
        let start = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let writer = Mf4Writer::new().with_start_time(start);
        let file = Mf4File::from_reader(Cursor::new(writer.to_bytes().unwrap())).unwrap();
        assert_eq!(file.start_time(), Some(start));
        assert_eq!(file.program(), "mf4dec");
    }

    #[test]
    fn test_multiple_groups_keep_their_time_base() {
        let mut writer = Mf4Writer::new();
        writer
            .add_group(vec![0.0, 1.0], vec![ChannelData::new("PackVolt", vec![400.0, 401.0])])
            .add_group(
                vec![0.0, 0.5, 1.0],
                vec![ChannelData::new("PackCurr", vec![-10.0, -12.0, -11.0]).with_unit("A")],
            );
        let mut file = Mf4File::from_reader(Cursor::new(writer.to_bytes().unwrap())).unwrap();

        let volt = file.get("PackVolt").unwrap();
        assert_eq!(volt.timestamps, vec![0.0, 1.0]);
        let curr = file.get("PackCurr").unwrap();
        assert_eq!(curr.timestamps, vec![0.0, 0.5, 1.0]);
        assert_eq!(curr.unit.as_deref(), Some("A"));
    }
}
