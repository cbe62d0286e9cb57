//! Record splitting and channel value extraction
//!
//! A data group's record bytes are either a plain sequence of fixed-size
//! records (sorted group, no record id) or an interleaving of records from
//! several channel groups, each prefixed with a record id (unsorted group).

use crate::types::{DecoderError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::collections::HashMap;

/// Channel data types the decoder can turn into numbers (`cn_data_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    UnsignedLe,
    UnsignedBe,
    SignedLe,
    SignedBe,
    FloatLe,
    FloatBe,
}

impl DataType {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DataType::UnsignedLe),
            1 => Some(DataType::UnsignedBe),
            2 => Some(DataType::SignedLe),
            3 => Some(DataType::SignedBe),
            4 => Some(DataType::FloatLe),
            5 => Some(DataType::FloatBe),
            _ => None,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, DataType::FloatLe | DataType::FloatBe)
    }
}

/// Position and encoding of a channel value inside a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChannelLayout {
    pub data_type: DataType,
    pub byte_offset: usize,
    pub bit_offset: u8,
    pub bit_count: u32,
}

impl ChannelLayout {
    fn byte_len(&self) -> usize {
        (self.bit_offset as usize + self.bit_count as usize + 7) / 8
    }

    /// Check that the layout can be read from records of `record_size` bytes
    pub fn validate(&self, record_size: usize) -> Result<()> {
        if self.data_type.is_float() {
            if self.bit_offset != 0 || !(self.bit_count == 32 || self.bit_count == 64) {
                return Err(DecoderError::Unsupported(format!(
                    "{}-bit float at bit offset {}",
                    self.bit_count, self.bit_offset
                )));
            }
        } else if self.bit_count == 0 || self.bit_offset as u32 + self.bit_count > 64 {
            return Err(DecoderError::Unsupported(format!(
                "{}-bit integer at bit offset {}",
                self.bit_count, self.bit_offset
            )));
        }

        if self.byte_offset + self.byte_len() > record_size {
            return Err(DecoderError::InvalidData(format!(
                "channel bytes {}..{} exceed record size {}",
                self.byte_offset,
                self.byte_offset + self.byte_len(),
                record_size
            )));
        }
        Ok(())
    }

    /// Read the raw value from one record; the layout must be validated
    pub fn read(&self, record: &[u8]) -> f64 {
        let bytes = &record[self.byte_offset..self.byte_offset + self.byte_len()];
        match self.data_type {
            DataType::FloatLe if self.bit_count == 32 => LittleEndian::read_f32(bytes) as f64,
            DataType::FloatLe => LittleEndian::read_f64(bytes),
            DataType::FloatBe if self.bit_count == 32 => BigEndian::read_f32(bytes) as f64,
            DataType::FloatBe => BigEndian::read_f64(bytes),
            DataType::UnsignedLe | DataType::SignedLe => {
                let raw = LittleEndian::read_uint(bytes, bytes.len());
                self.finish_integer(raw)
            }
            DataType::UnsignedBe | DataType::SignedBe => {
                let raw = BigEndian::read_uint(bytes, bytes.len());
                self.finish_integer(raw)
            }
        }
    }

    fn finish_integer(&self, raw: u64) -> f64 {
        let value = raw >> self.bit_offset;
        let value = if self.bit_count >= 64 {
            value
        } else {
            value & ((1u64 << self.bit_count) - 1)
        };

        match self.data_type {
            DataType::SignedLe | DataType::SignedBe => {
                let shift = 64 - self.bit_count;
                (((value << shift) as i64) >> shift) as f64
            }
            _ => value as f64,
        }
    }
}

/// How records of one channel group are laid out in an unsorted block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordKind {
    Fixed(usize),
    VariableLength,
}

/// Split the records of one channel group out of a data group's bytes
///
/// With `record_id_size == 0` the data is a sequence of `record_size`
/// records for a single channel group. Otherwise every record is preceded
/// by its channel group's record id and `kinds` gives the size of each.
pub(crate) fn split_records<'a>(
    data: &'a [u8],
    record_id_size: u8,
    record_size: usize,
    target_id: u64,
    kinds: &HashMap<u64, RecordKind>,
) -> Result<Vec<&'a [u8]>> {
    if record_id_size == 0 {
        if record_size == 0 {
            return Ok(Vec::new());
        }
        return Ok(data.chunks_exact(record_size).collect());
    }

    let id_size = record_id_size as usize;
    if !matches!(id_size, 1 | 2 | 4 | 8) {
        return Err(DecoderError::InvalidData(format!(
            "record id size {} not supported",
            record_id_size
        )));
    }

    let mut records = Vec::new();
    let mut pos = 0usize;
    while pos + id_size <= data.len() {
        let id = LittleEndian::read_uint(&data[pos..pos + id_size], id_size);
        pos += id_size;

        let len = match kinds.get(&id) {
            Some(RecordKind::Fixed(size)) => *size,
            Some(RecordKind::VariableLength) => {
                if pos + 4 > data.len() {
                    break;
                }
                let len = LittleEndian::read_u32(&data[pos..pos + 4]) as usize;
                pos += 4;
                len
            }
            None => {
                return Err(DecoderError::InvalidData(format!(
                    "unknown record id {} at byte {}",
                    id,
                    pos - id_size
                )))
            }
        };

        if pos + len > data.len() {
            log::warn!("Truncated record for id {} at byte {}", id, pos);
            break;
        }
        if id == target_id {
            records.push(&data[pos..pos + len]);
        }
        pos += len;
    }

    Ok(records)
}
