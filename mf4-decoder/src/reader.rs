//! MF4 file reader
//!
//! Opening a file validates the identification and header blocks and walks
//! the data group / channel group / channel chains to build a channel index.
//! Sample data is only read when a channel is requested with [`Mf4File::get`].

use crate::blocks::{
    read_block, read_data, read_id_block, read_text, ChannelBlock, ChannelGroupBlock,
    ConversionBlock, DataGroupBlock, HeaderBlock, ID_BLOCK_SIZE,
};
use crate::conversion::Conversion;
use crate::record::{split_records, ChannelLayout, DataType, RecordKind};
use crate::types::{DecoderError, Result, Signal, Timestamp};
use chrono::DateTime;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

// cn_type values
const CN_TYPE_FIXED: u8 = 0;
const CN_TYPE_MASTER: u8 = 2;
const CN_TYPE_VIRTUAL_MASTER: u8 = 3;
const CN_TYPE_SYNC: u8 = 4;
const CN_TYPE_VIRTUAL_DATA: u8 = 6;

/// Public description of one channel in the file
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    /// Channel name
    pub name: String,
    /// Engineering unit, if any
    pub unit: Option<String>,
    /// True for master (time base) channels
    pub is_master: bool,
}

#[derive(Debug, Clone)]
struct DataGroupInfo {
    data: u64,
    record_id_size: u8,
    kinds: HashMap<u64, RecordKind>,
}

#[derive(Debug, Clone)]
struct ChannelGroupInfo {
    data_group: usize,
    record_id: u64,
    cycle_count: u64,
    record_size: usize,
    master: Option<usize>,
}

#[derive(Debug, Clone)]
struct ChannelEntry {
    info: ChannelInfo,
    group: usize,
    channel_type: u8,
    layout: std::result::Result<ChannelLayout, String>,
    conversion: Conversion,
}

/// An opened MF4 file
pub struct Mf4File<R> {
    reader: R,
    version: u16,
    program: String,
    finalized: bool,
    start_time: Option<Timestamp>,
    data_groups: Vec<DataGroupInfo>,
    channel_groups: Vec<ChannelGroupInfo>,
    channels: Vec<ChannelEntry>,
}

impl Mf4File<BufReader<File>> {
    /// Open an MF4 file from disk and index its channels
    pub fn open(path: &Path) -> Result<Self> {
        log::debug!("Opening MF4 file: {:?}", path);
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> Mf4File<R> {
    /// Index an MF4 file from any seekable reader
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let id = read_id_block(&mut reader)?;
        if !(400..500).contains(&id.version) {
            return Err(DecoderError::UnsupportedVersion(format!(
                "{} ({})",
                id.version_string, id.version
            )));
        }
        if !id.finalized {
            log::warn!("MF4 file is not finalized, cycle counts may be incomplete");
        }

        let header = HeaderBlock::parse(&read_block(&mut reader, ID_BLOCK_SIZE)?)?;
        let start_time = DateTime::from_timestamp(
            (header.start_time_ns / 1_000_000_000) as i64,
            (header.start_time_ns % 1_000_000_000) as u32,
        );
        if header.time_flags & 0x01 != 0 {
            log::debug!(
                "Header start time is local time (tz offset {} min, dst {} min)",
                header.tz_offset_min,
                header.dst_offset_min
            );
        }

        let mut file = Mf4File {
            reader,
            version: id.version,
            program: id.program,
            finalized: id.finalized,
            start_time,
            data_groups: Vec::new(),
            channel_groups: Vec::new(),
            channels: Vec::new(),
        };
        file.index(header.first_data_group)?;

        log::debug!(
            "Indexed {} data groups, {} channel groups, {} channels",
            file.data_groups.len(),
            file.channel_groups.len(),
            file.channels.len()
        );
        Ok(file)
    }

    fn index(&mut self, first_data_group: u64) -> Result<()> {
        let mut visited = HashSet::new();
        let mut dg_addr = first_data_group;

        while dg_addr != 0 {
            if !visited.insert(dg_addr) {
                return Err(DecoderError::invalid_block(dg_addr, "data group chain loops"));
            }
            let dg = DataGroupBlock::parse(&read_block(&mut self.reader, dg_addr)?)?;
            let dg_index = self.data_groups.len();
            let mut kinds = HashMap::new();

            let mut cg_addr = dg.first_channel_group;
            while cg_addr != 0 {
                if !visited.insert(cg_addr) {
                    return Err(DecoderError::invalid_block(cg_addr, "channel group chain loops"));
                }
                let cg = ChannelGroupBlock::parse(&read_block(&mut self.reader, cg_addr)?)?;
                let kind = if cg.is_vlsd() {
                    RecordKind::VariableLength
                } else {
                    RecordKind::Fixed(cg.record_size())
                };
                kinds.insert(cg.record_id, kind);

                if !cg.is_vlsd() {
                    self.index_channel_group(&cg, dg_index, &mut visited)?;
                }
                cg_addr = cg.next;
            }

            self.data_groups.push(DataGroupInfo {
                data: dg.data,
                record_id_size: dg.record_id_size,
                kinds,
            });
            dg_addr = dg.next;
        }
        Ok(())
    }

    fn index_channel_group(
        &mut self,
        cg: &ChannelGroupBlock,
        dg_index: usize,
        visited: &mut HashSet<u64>,
    ) -> Result<()> {
        let group_index = self.channel_groups.len();
        let mut master = None;

        let mut cn_addr = cg.first_channel;
        while cn_addr != 0 {
            if !visited.insert(cn_addr) {
                return Err(DecoderError::invalid_block(cn_addr, "channel chain loops"));
            }
            let cn = ChannelBlock::parse(&read_block(&mut self.reader, cn_addr)?)?;
            let entry = self.read_channel(&cn, group_index)?;

            if entry.info.is_master && master.is_none() {
                master = Some(self.channels.len());
            }
            self.channels.push(entry);
            cn_addr = cn.next;
        }

        self.channel_groups.push(ChannelGroupInfo {
            data_group: dg_index,
            record_id: cg.record_id,
            cycle_count: cg.cycle_count,
            record_size: cg.record_size(),
            master,
        });
        Ok(())
    }

    fn read_channel(&mut self, cn: &ChannelBlock, group: usize) -> Result<ChannelEntry> {
        let name = read_text(&mut self.reader, cn.name)?.unwrap_or_default();
        let mut unit = read_text(&mut self.reader, cn.unit)?;

        let conversion = if cn.conversion != 0 {
            let cc = ConversionBlock::parse(&read_block(&mut self.reader, cn.conversion)?)?;
            if unit.as_deref().map_or(true, str::is_empty) {
                unit = read_text(&mut self.reader, cc.unit)?;
            }
            Conversion::from_block(&cc, &name)
        } else {
            Conversion::Identity
        };
        let unit = unit.filter(|u| !u.is_empty());

        let layout = match cn.channel_type {
            CN_TYPE_FIXED | CN_TYPE_MASTER | CN_TYPE_SYNC => match DataType::from_code(cn.data_type) {
                Some(data_type) => Ok(ChannelLayout {
                    data_type,
                    byte_offset: cn.byte_offset as usize,
                    bit_offset: cn.bit_offset,
                    bit_count: cn.bit_count,
                }),
                None => Err(format!("data type {} is not numeric", cn.data_type)),
            },
            CN_TYPE_VIRTUAL_MASTER | CN_TYPE_VIRTUAL_DATA => {
                Err("virtual channel has no record bytes".to_string())
            }
            other => Err(format!("channel type {}", other)),
        };

        let is_master = matches!(cn.channel_type, CN_TYPE_MASTER | CN_TYPE_VIRTUAL_MASTER);
        if is_master && cn.sync_type != 1 {
            log::debug!("Master channel '{}' has sync type {}", name, cn.sync_type);
        }

        Ok(ChannelEntry {
            info: ChannelInfo {
                name,
                unit,
                is_master,
            },
            group,
            channel_type: cn.channel_type,
            layout,
            conversion,
        })
    }

    /// MDF version number (e.g. 410)
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Program identifier of the writing tool
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Measurement start time from the header block
    pub fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    /// All channels in file order
    pub fn channels(&self) -> impl Iterator<Item = &ChannelInfo> {
        self.channels.iter().map(|entry| &entry.info)
    }

    /// Channel names in file order
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels().map(|info| info.name.as_str()).collect()
    }

    /// True if a channel with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.channels.iter().any(|entry| entry.info.name == name)
    }

    /// Read a channel by name
    ///
    /// When several channels share the name, the first one in file order is
    /// returned. Timestamps come from the master channel of the same channel
    /// group, or are the record index when the group has no master.
    pub fn get(&mut self, name: &str) -> Result<Signal> {
        let mut matches = self
            .channels
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.info.name == name)
            .map(|(index, _)| index);
        let index = matches
            .next()
            .ok_or_else(|| DecoderError::SignalNotFound(name.to_string()))?;
        if matches.next().is_some() {
            log::debug!("Multiple channels named '{}', using the first occurrence", name);
        }

        let group = self.channel_groups[self.channels[index].group].clone();
        let data_group = self.data_groups[group.data_group].clone();

        let data = read_data(&mut self.reader, data_group.data)?;
        let records = split_records(
            &data,
            data_group.record_id_size,
            group.record_size,
            group.record_id,
            &data_group.kinds,
        )?;

        let count = if self.finalized {
            records.len().min(group.cycle_count as usize)
        } else {
            records.len()
        };
        if records.len() < group.cycle_count as usize {
            log::warn!(
                "Channel '{}': {} records found, header announces {}",
                name,
                records.len(),
                group.cycle_count
            );
        }
        let records = &records[..count];

        let samples = self.channel_values(index, records, group.record_size)?;
        let timestamps = match group.master {
            Some(master) if master == index => samples.clone(),
            Some(master) => self.channel_values(master, records, group.record_size)?,
            None => (0..count).map(|i| i as f64).collect(),
        };

        let entry = &self.channels[index];
        Ok(Signal {
            name: entry.info.name.clone(),
            unit: entry.info.unit.clone(),
            samples,
            timestamps,
        })
    }

    fn channel_values(&self, index: usize, records: &[&[u8]], record_size: usize) -> Result<Vec<f64>> {
        let entry = &self.channels[index];

        if matches!(entry.channel_type, CN_TYPE_VIRTUAL_MASTER | CN_TYPE_VIRTUAL_DATA) {
            return Ok((0..records.len())
                .map(|i| entry.conversion.apply(i as f64))
                .collect());
        }

        let layout = entry.layout.as_ref().map_err(|reason| {
            DecoderError::Unsupported(format!("channel '{}': {}", entry.info.name, reason))
        })?;
        layout.validate(record_size)?;

        Ok(records
            .iter()
            .map(|record| entry.conversion.apply(layout.read(record)))
            .collect())
    }
}
