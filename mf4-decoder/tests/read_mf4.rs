// Reading MF4 files from disk, both written by Mf4Writer and assembled by hand
use byteorder::{LittleEndian, WriteBytesExt};
use mf4_decoder::{ChannelData, DecoderError, Mf4File, Mf4Writer, SignalSource};
use std::fs;

fn battery_log() -> Mf4Writer {
    let timestamps: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let vmax: Vec<f64> = (0..10).map(|i| 3.3 + 0.1 * i as f64).collect();
    let vmin: Vec<f64> = (0..10).map(|i| 3.0 + 0.1 * i as f64).collect();

    let mut writer = Mf4Writer::new();
    writer.add_group(
        timestamps,
        vec![
            ChannelData::new("CellVMax", vmax).with_unit("V"),
            ChannelData::new("CellVMin", vmin).with_unit("V"),
        ],
    );
    writer
}

#[test]
fn read_written_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test1.mf4");
    battery_log().write_to_path(&path).unwrap();

    let mut file = Mf4File::open(&path).unwrap();
    assert_eq!(file.channel_names(), vec!["time", "CellVMax", "CellVMin"]);

    let vmax = file.signal("CellVMax").unwrap();
    assert_eq!(vmax.len(), 10);
    assert_eq!(vmax.unit.as_deref(), Some("V"));
    assert_eq!(vmax.timestamps.first(), Some(&0.0));
    assert_eq!(vmax.timestamps.last(), Some(&9.0));
    assert!((vmax.samples[9] - 4.2).abs() < 1e-9);

    let vmin = file.signal("CellVMin").unwrap();
    assert!((vmin.samples[0] - 3.0).abs() < 1e-9);
}

#[test]
fn garbage_file_is_not_mdf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.mf4");
    fs::write(&path, vec![0x55u8; 256]).unwrap();

    assert!(matches!(Mf4File::open(&path), Err(DecoderError::NotMdf(_))));
}

#[test]
fn truncated_file_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.mf4");
    let bytes = battery_log().to_bytes().unwrap();
    fs::write(&path, &bytes[..100]).unwrap();

    assert!(Mf4File::open(&path).is_err());
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

/// Address of the first data group, from link 0 of the header block
fn first_data_group(bytes: &[u8]) -> usize {
    read_u64(bytes, 64 + 24) as usize
}

#[test]
fn oversized_block_length_is_rejected_on_open() {
    let mut bytes = battery_log().to_bytes().unwrap();
    let dg = first_data_group(&bytes);
    bytes[dg + 8..dg + 16].copy_from_slice(&((1u64 << 34) - 1).to_le_bytes());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.mf4");
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(Mf4File::open(&path), Err(DecoderError::InvalidBlock { .. })));
}

/// Replace the data link of the first data group with a block appended at
/// the end of the file, built from that block's own address
fn with_data_block(build: impl Fn(u64, u64) -> Vec<u8>) -> Vec<u8> {
    let mut bytes = battery_log().to_bytes().unwrap();
    let dg = first_data_group(&bytes);
    let data_link = dg + 24 + 2 * 8;
    let original = read_u64(&bytes, data_link);

    let address = bytes.len() as u64;
    bytes.extend_from_slice(&build(address, original));
    bytes[data_link..data_link + 8].copy_from_slice(&address.to_le_bytes());
    bytes
}

fn list_block(id: &[u8; 4], links: &[u64]) -> Vec<u8> {
    let data = [0u8; 16];
    let mut block = Vec::new();
    block.extend_from_slice(id);
    block.write_u32::<LittleEndian>(0).unwrap();
    block
        .write_u64::<LittleEndian>(24 + links.len() as u64 * 8 + data.len() as u64)
        .unwrap();
    block.write_u64::<LittleEndian>(links.len() as u64).unwrap();
    for link in links {
        block.write_u64::<LittleEndian>(*link).unwrap();
    }
    block.extend_from_slice(&data);
    block
}

#[test]
fn data_list_chained_to_itself_fails_the_lookup() {
    let bytes = with_data_block(|own, dt| list_block(b"##DL", &[own, dt]));
    let mut file = Mf4File::from_reader(std::io::Cursor::new(bytes)).unwrap();

    assert!(matches!(file.signal("CellVMax"), Err(DecoderError::InvalidBlock { .. })));
}

#[test]
fn header_list_pointing_to_itself_fails_the_lookup() {
    let bytes = with_data_block(|own, _| list_block(b"##HL", &[own]));
    let mut file = Mf4File::from_reader(std::io::Cursor::new(bytes)).unwrap();

    assert!(matches!(file.signal("CellVMax"), Err(DecoderError::InvalidBlock { .. })));
    assert!(file.contains("CellVMin"));
}

#[test]
fn data_list_with_valid_fragment_still_reads() {
    let bytes = with_data_block(|_, dt| list_block(b"##DL", &[0, dt]));
    let mut file = Mf4File::from_reader(std::io::Cursor::new(bytes)).unwrap();

    let vmax = file.signal("CellVMax").unwrap();
    assert_eq!(vmax.len(), 10);
}

// --- hand-assembled file: unsorted data group, integer channel, conversion ---

struct Builder {
    buf: Vec<u8>,
}

impl Builder {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"MDF     4.20    handmade");
        buf.extend_from_slice(&[0u8; 4]);
        buf.write_u16::<LittleEndian>(420).unwrap();
        buf.extend_from_slice(&[0u8; 34]);
        // room for the header block
        buf.resize(64 + 24 + 6 * 8 + 32, 0);
        Builder { buf }
    }

    fn block(&mut self, id: &[u8; 4], links: &[u64], data: &[u8]) -> u64 {
        let address = self.buf.len() as u64;
        self.buf.extend_from_slice(id);
        self.buf.write_u32::<LittleEndian>(0).unwrap();
        self.buf
            .write_u64::<LittleEndian>(24 + links.len() as u64 * 8 + data.len() as u64)
            .unwrap();
        self.buf.write_u64::<LittleEndian>(links.len() as u64).unwrap();
        for link in links {
            self.buf.write_u64::<LittleEndian>(*link).unwrap();
        }
        self.buf.extend_from_slice(data);
        while self.buf.len() % 8 != 0 {
            self.buf.push(0);
        }
        address
    }

    fn text(&mut self, id: &[u8; 4], text: &str) -> u64 {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        self.block(id, &[], &data)
    }

    fn channel(&mut self, next: u64, name: &str, conversion: u64, layout: (u8, u8, u8, u32, u32)) -> u64 {
        let (cn_type, sync_type, data_type, byte_offset, bit_count) = layout;
        let name = self.text(b"##TX", name);
        let mut data = vec![cn_type, sync_type, data_type, 0];
        data.write_u32::<LittleEndian>(byte_offset).unwrap();
        data.write_u32::<LittleEndian>(bit_count).unwrap();
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(&[0u8; 48]);
        self.block(b"##CN", &[next, 0, name, 0, conversion, 0, 0, 0], &data)
    }

    fn channel_group(&mut self, next: u64, first_channel: u64, record_id: u64, cycles: u64, flags: u16, data_bytes: u32) -> u64 {
        let mut data = Vec::new();
        data.write_u64::<LittleEndian>(record_id).unwrap();
        data.write_u64::<LittleEndian>(cycles).unwrap();
        data.write_u16::<LittleEndian>(flags).unwrap();
        data.write_u16::<LittleEndian>(0).unwrap();
        data.write_u32::<LittleEndian>(0).unwrap();
        data.write_u32::<LittleEndian>(data_bytes).unwrap();
        data.write_u32::<LittleEndian>(0).unwrap();
        self.block(b"##CG", &[next, first_channel, 0, 0, 0, 0], &data)
    }

    fn finish(mut self, first_dg: u64) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(b"##HD");
        header.write_u32::<LittleEndian>(0).unwrap();
        header.write_u64::<LittleEndian>(24 + 6 * 8 + 32).unwrap();
        header.write_u64::<LittleEndian>(6).unwrap();
        for link in [first_dg, 0, 0, 0, 0, 0] {
            header.write_u64::<LittleEndian>(link).unwrap();
        }
        header.extend_from_slice(&[0u8; 32]);
        self.buf[64..64 + header.len()].copy_from_slice(&header);
        self.buf
    }
}

#[test]
fn read_unsorted_group_with_conversion() {
    let mut b = Builder::new();

    // linear conversion: temp = -40 + 0.5 * raw, unit stored in an MD block
    let unit = b.text(b"##MD", "<CCunit><TX>degC</TX></CCunit>");
    let mut cc = vec![1u8, 0];
    cc.write_u16::<LittleEndian>(0).unwrap(); // flags
    cc.write_u16::<LittleEndian>(0).unwrap(); // ref count
    cc.write_u16::<LittleEndian>(2).unwrap(); // val count
    cc.write_f64::<LittleEndian>(0.0).unwrap();
    cc.write_f64::<LittleEndian>(0.0).unwrap();
    cc.write_f64::<LittleEndian>(-40.0).unwrap();
    cc.write_f64::<LittleEndian>(0.5).unwrap();
    let conversion = b.block(b"##CC", &[0, unit, 0, 0], &cc);

    // record id 1: [time f32][temp u16], record id 2: VLSD payloads
    let temp = b.channel(0, "CoolantTemp", conversion, (0, 0, 0, 4, 16));
    let time = b.channel(temp, "t", 0, (2, 1, 4, 0, 32));

    let mut records = Vec::new();
    for (i, raw) in [100u16, 110, 120].iter().enumerate() {
        records.push(1u8);
        records.write_f32::<LittleEndian>(i as f32 * 0.5).unwrap();
        records.write_u16::<LittleEndian>(*raw).unwrap();
        // interleaved variable length record that must be skipped
        records.push(2u8);
        records.write_u32::<LittleEndian>(3).unwrap();
        records.extend_from_slice(b"abc");
    }
    let data = b.block(b"##DT", &[], &records);

    let vlsd_group = b.channel_group(0, 0, 2, 3, 0x0001, 0);
    let value_group = b.channel_group(vlsd_group, time, 1, 3, 0, 6);
    let mut dg = vec![1u8];
    dg.extend_from_slice(&[0u8; 7]);
    let data_group = b.block(b"##DG", &[0, value_group, data, 0], &dg);

    let bytes = b.finish(data_group);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unsorted.mf4");
    fs::write(&path, bytes).unwrap();

    let mut file = Mf4File::open(&path).unwrap();
    assert_eq!(file.version(), 420);

    let signal = file.signal("CoolantTemp").unwrap();
    assert_eq!(signal.unit.as_deref(), Some("degC"));
    assert_eq!(signal.samples, vec![10.0, 15.0, 20.0]);
    assert_eq!(signal.timestamps, vec![0.0, 0.5, 1.0]);
}
