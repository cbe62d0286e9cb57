//! MDF4 block parsing
//!
//! Every MDF4 block after the identification block starts with the same
//! 24-byte header (`##XX` id, reserved, total length, link count), followed
//! by `link_count` 64-bit file offsets and the block data section. This
//! module reads raw blocks and interprets the handful of block types the
//! reader needs.

use crate::types::{DecoderError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Size of the identification block at the start of every file
pub(crate) const ID_BLOCK_SIZE: u64 = 64;
/// Size of the common block header
pub(crate) const BLOCK_HEADER_SIZE: u64 = 24;

// Upper bounds used to reject garbage headers before allocating.
const MAX_LINK_COUNT: u64 = 1 << 20;
const MAX_BLOCK_LENGTH: u64 = 1 << 34;

/// A block as stored in the file: id, links and undecoded data section
#[derive(Debug, Clone)]
pub(crate) struct RawBlock {
    pub address: u64,
    pub id: [u8; 4],
    pub links: Vec<u64>,
    pub data: Vec<u8>,
}

impl RawBlock {
    pub fn id_str(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }

    /// Fail unless the block carries the given id (e.g. `b"##CN"`)
    pub fn expect(&self, id: &[u8; 4]) -> Result<()> {
        if &self.id != id {
            return Err(DecoderError::invalid_block(
                self.address,
                format!(
                    "expected {} block, found {}",
                    String::from_utf8_lossy(id),
                    self.id_str()
                ),
            ));
        }
        Ok(())
    }

    /// Link by index, 0 (nil) when the block has fewer links
    pub fn link(&self, index: usize) -> u64 {
        self.links.get(index).copied().unwrap_or(0)
    }

    fn cursor(&self) -> Cursor<&[u8]> {
        Cursor::new(self.data.as_slice())
    }

    fn short_data(&self, needed: usize) -> Result<()> {
        if self.data.len() < needed {
            return Err(DecoderError::invalid_block(
                self.address,
                format!(
                    "{} data section has {} bytes, expected at least {}",
                    self.id_str(),
                    self.data.len(),
                    needed
                ),
            ));
        }
        Ok(())
    }
}

/// Read the block starting at `address`
pub(crate) fn read_block<R: Read + Seek>(reader: &mut R, address: u64) -> Result<RawBlock> {
    if address < ID_BLOCK_SIZE {
        return Err(DecoderError::invalid_block(address, "link points into the identification block"));
    }

    let stream_len = reader.seek(SeekFrom::End(0))?;
    if address.saturating_add(BLOCK_HEADER_SIZE) > stream_len {
        return Err(DecoderError::invalid_block(address, "block header past end of file"));
    }
    reader.seek(SeekFrom::Start(address))?;

    let mut id = [0u8; 4];
    reader.read_exact(&mut id)?;
    if &id[..2] != b"##" {
        return Err(DecoderError::invalid_block(address, "missing ## block marker"));
    }
    let _reserved = reader.read_u32::<LittleEndian>()?;
    let length = reader.read_u64::<LittleEndian>()?;
    let link_count = reader.read_u64::<LittleEndian>()?;

    if link_count > MAX_LINK_COUNT || length > MAX_BLOCK_LENGTH {
        return Err(DecoderError::invalid_block(address, "implausible block header"));
    }
    let links_size = link_count * 8;
    if length < BLOCK_HEADER_SIZE + links_size {
        return Err(DecoderError::invalid_block(
            address,
            format!("block length {} too small for {} links", length, link_count),
        ));
    }
    if length > stream_len - address {
        return Err(DecoderError::invalid_block(
            address,
            format!("block length {} runs past end of file ({} bytes)", length, stream_len),
        ));
    }

    let mut links = Vec::with_capacity(link_count as usize);
    for _ in 0..link_count {
        links.push(reader.read_u64::<LittleEndian>()?);
    }

    let data_len = (length - BLOCK_HEADER_SIZE - links_size) as usize;
    let mut data = vec![0u8; data_len];
    reader.read_exact(&mut data)?;

    Ok(RawBlock {
        address,
        id,
        links,
        data,
    })
}

/// Identification block (file offset 0, fixed 64 bytes)
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IdBlock {
    pub version_string: String,
    pub program: String,
    pub version: u16,
    pub finalized: bool,
}

pub(crate) fn read_id_block<R: Read + Seek>(reader: &mut R) -> Result<IdBlock> {
    reader.seek(SeekFrom::Start(0))?;
    let mut raw = [0u8; ID_BLOCK_SIZE as usize];
    reader
        .read_exact(&mut raw)
        .map_err(|_| DecoderError::NotMdf("file shorter than the identification block".to_string()))?;

    let file_id = &raw[0..8];
    let finalized = match file_id {
        b"MDF     " => true,
        b"UnFinMF " => false,
        _ => {
            return Err(DecoderError::NotMdf(format!(
                "unexpected file identifier {:?}",
                String::from_utf8_lossy(file_id)
            )))
        }
    };

    let version_string = String::from_utf8_lossy(&raw[8..16]).trim().to_string();
    let program = String::from_utf8_lossy(&raw[16..24]).trim().to_string();
    let mut cursor = Cursor::new(&raw[28..30]);
    let version = cursor.read_u16::<LittleEndian>()?;

    Ok(IdBlock {
        version_string,
        program,
        version,
        finalized,
    })
}

/// `##HD` header block
#[derive(Debug, Clone)]
pub(crate) struct HeaderBlock {
    pub first_data_group: u64,
    pub start_time_ns: u64,
    pub tz_offset_min: i16,
    pub dst_offset_min: i16,
    pub time_flags: u8,
}

impl HeaderBlock {
    pub fn parse(block: &RawBlock) -> Result<Self> {
        block.expect(b"##HD")?;
        block.short_data(14)?;
        let mut c = block.cursor();
        let start_time_ns = c.read_u64::<LittleEndian>()?;
        let tz_offset_min = c.read_i16::<LittleEndian>()?;
        let dst_offset_min = c.read_i16::<LittleEndian>()?;
        let time_flags = c.read_u8()?;
        Ok(Self {
            first_data_group: block.link(0),
            start_time_ns,
            tz_offset_min,
            dst_offset_min,
            time_flags,
        })
    }
}

/// `##DG` data group block
#[derive(Debug, Clone)]
pub(crate) struct DataGroupBlock {
    pub next: u64,
    pub first_channel_group: u64,
    pub data: u64,
    pub record_id_size: u8,
}

impl DataGroupBlock {
    pub fn parse(block: &RawBlock) -> Result<Self> {
        block.expect(b"##DG")?;
        block.short_data(1)?;
        Ok(Self {
            next: block.link(0),
            first_channel_group: block.link(1),
            data: block.link(2),
            record_id_size: block.data[0],
        })
    }
}

/// `cg_flags` bit marking a variable length signal data group
pub(crate) const CG_FLAG_VLSD: u16 = 0x0001;

/// `##CG` channel group block
#[derive(Debug, Clone)]
pub(crate) struct ChannelGroupBlock {
    pub next: u64,
    pub first_channel: u64,
    pub record_id: u64,
    pub cycle_count: u64,
    pub flags: u16,
    pub data_bytes: u32,
    pub inval_bytes: u32,
}

impl ChannelGroupBlock {
    pub fn parse(block: &RawBlock) -> Result<Self> {
        block.expect(b"##CG")?;
        block.short_data(32)?;
        let mut c = block.cursor();
        let record_id = c.read_u64::<LittleEndian>()?;
        let cycle_count = c.read_u64::<LittleEndian>()?;
        let flags = c.read_u16::<LittleEndian>()?;
        let _path_separator = c.read_u16::<LittleEndian>()?;
        let _reserved = c.read_u32::<LittleEndian>()?;
        let data_bytes = c.read_u32::<LittleEndian>()?;
        let inval_bytes = c.read_u32::<LittleEndian>()?;
        Ok(Self {
            next: block.link(0),
            first_channel: block.link(1),
            record_id,
            cycle_count,
            flags,
            data_bytes,
            inval_bytes,
        })
    }

    pub fn is_vlsd(&self) -> bool {
        self.flags & CG_FLAG_VLSD != 0
    }

    /// Bytes of one record, excluding the record id
    pub fn record_size(&self) -> usize {
        self.data_bytes as usize + self.inval_bytes as usize
    }
}

/// `##CN` channel block
#[derive(Debug, Clone)]
pub(crate) struct ChannelBlock {
    pub next: u64,
    pub name: u64,
    pub conversion: u64,
    pub unit: u64,
    pub channel_type: u8,
    pub sync_type: u8,
    pub data_type: u8,
    pub bit_offset: u8,
    pub byte_offset: u32,
    pub bit_count: u32,
}

impl ChannelBlock {
    pub fn parse(block: &RawBlock) -> Result<Self> {
        block.expect(b"##CN")?;
        block.short_data(12)?;
        let mut c = block.cursor();
        let channel_type = c.read_u8()?;
        let sync_type = c.read_u8()?;
        let data_type = c.read_u8()?;
        let bit_offset = c.read_u8()?;
        let byte_offset = c.read_u32::<LittleEndian>()?;
        let bit_count = c.read_u32::<LittleEndian>()?;
        Ok(Self {
            next: block.link(0),
            name: block.link(2),
            conversion: block.link(4),
            unit: block.link(6),
            channel_type,
            sync_type,
            data_type,
            bit_offset,
            byte_offset,
            bit_count,
        })
    }
}

/// `##CC` conversion block
#[derive(Debug, Clone)]
pub(crate) struct ConversionBlock {
    pub unit: u64,
    pub conversion_type: u8,
    pub values: Vec<f64>,
}

impl ConversionBlock {
    pub fn parse(block: &RawBlock) -> Result<Self> {
        block.expect(b"##CC")?;
        block.short_data(24)?;
        let mut c = block.cursor();
        let conversion_type = c.read_u8()?;
        let _precision = c.read_u8()?;
        let _flags = c.read_u16::<LittleEndian>()?;
        let _ref_count = c.read_u16::<LittleEndian>()?;
        let val_count = c.read_u16::<LittleEndian>()? as usize;
        let _phy_range_min = c.read_f64::<LittleEndian>()?;
        let _phy_range_max = c.read_f64::<LittleEndian>()?;

        block.short_data(24 + val_count * 8)?;
        let mut values = Vec::with_capacity(val_count);
        for _ in 0..val_count {
            values.push(c.read_f64::<LittleEndian>()?);
        }

        Ok(Self {
            unit: block.link(1),
            conversion_type,
            values,
        })
    }
}

/// Read the text behind a `##TX` or `##MD` link, `None` for nil links
///
/// For `##MD` blocks the content of the first `<TX>` element is returned
/// when present, otherwise the whole XML string.
pub(crate) fn read_text<R: Read + Seek>(reader: &mut R, address: u64) -> Result<Option<String>> {
    if address == 0 {
        return Ok(None);
    }
    let block = read_block(reader, address)?;
    let raw = block
        .data
        .split(|b| *b == 0)
        .next()
        .unwrap_or_default();
    let text = String::from_utf8_lossy(raw);

    let text = match &block.id {
        b"##TX" => text.trim().to_string(),
        b"##MD" => match extract_xml_element(&text, "TX") {
            Some(inner) => unescape_xml(inner.trim()),
            None => text.trim().to_string(),
        },
        _ => {
            return Err(DecoderError::invalid_block(
                address,
                format!("expected text block, found {}", block.id_str()),
            ))
        }
    };

    Ok(Some(text))
}

fn extract_xml_element<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Read the record bytes of a data group
///
/// Follows `##DL` lists (and `##HL` headers in front of them) and
/// concatenates the `##DT` fragments in list order.
pub(crate) fn read_data<R: Read + Seek>(reader: &mut R, address: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    append_data(reader, address, &mut out, &mut visited)?;
    Ok(out)
}

fn enter(visited: &mut HashSet<u64>, address: u64) -> Result<()> {
    if !visited.insert(address) {
        return Err(DecoderError::invalid_block(address, "data block chain loops"));
    }
    Ok(())
}

fn append_data<R: Read + Seek>(
    reader: &mut R,
    address: u64,
    out: &mut Vec<u8>,
    visited: &mut HashSet<u64>,
) -> Result<()> {
    if address == 0 {
        return Ok(());
    }
    enter(visited, address)?;
    let block = read_block(reader, address)?;
    match &block.id {
        b"##DT" => {
            out.extend_from_slice(&block.data);
        }
        b"##DL" => {
            let mut list = block;
            loop {
                for &fragment in list.links.iter().skip(1) {
                    append_data(reader, fragment, out, visited)?;
                }
                let next = list.link(0);
                if next == 0 {
                    break;
                }
                enter(visited, next)?;
                list = read_block(reader, next)?;
                list.expect(b"##DL")?;
            }
        }
        b"##HL" => {
            append_data(reader, block.link(0), out, visited)?;
        }
        b"##DZ" => {
            return Err(DecoderError::Unsupported(format!(
                "compressed data block (##DZ) at 0x{:X}",
                address
            )));
        }
        _ => {
            return Err(DecoderError::invalid_block(
                address,
                format!("expected data block, found {}", block.id_str()),
            ));
        }
    }
    Ok(())
}
