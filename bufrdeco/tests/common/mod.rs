#![allow(dead_code)]

use libbufrdeco::DecoderConfig;
use std::path::Path;
use tablelib::config::TablesConfig;

/// MSB-first bit packer for building section 4 payloads.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, value: u64, width: usize) -> &mut Self {
        for i in (0..width).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 == 1 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.bits % 8);
            }
            self.bits += 1;
        }
        self
    }

    pub fn text(&mut self, s: &[u8]) -> &mut Self {
        for b in s {
            self.put(*b as u64, 8);
        }
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

fn b_line(fxy: &str, name: &str, unit: &str, scale: i32, reference: i32, width: u32) -> String {
    format!(
        " {} {:<64} {:<24} {:>3} {:>12} {:>3}\n",
        fxy, name, unit, scale, reference, width
    )
}

pub fn table_b() -> String {
    [
        b_line("001015", "STATION OR SITE NAME", "CCITT IA5", 0, 0, 32),
        b_line("002001", "TYPE OF STATION", "CODE TABLE", 0, 0, 2),
        b_line("002002", "TYPE OF INSTRUMENTATION FOR WIND MEASUREMENT", "FLAG TABLE", 0, 0, 4),
        b_line("004004", "HOUR", "HOUR", 0, 0, 5),
        b_line("007030", "HEIGHT OF STATION GROUND ABOVE MEAN SEA LEVEL", "M", 1, -4000, 17),
        b_line("012101", "TEMPERATURE/AIR TEMPERATURE", "K", 2, 0, 16),
        b_line("031000", "SHORT DELAYED DESCRIPTOR REPLICATION FACTOR", "NUMERIC", 0, 0, 1),
        b_line("031001", "DELAYED DESCRIPTOR REPLICATION FACTOR", "NUMERIC", 0, 0, 8),
        b_line("031021", "ASSOCIATED FIELD SIGNIFICANCE", "CODE TABLE", 0, 0, 6),
    ]
    .concat()
}

pub const TABLE_C: &str = "\
002001 0002 0000 01 AUTOMATIC
            0001 01 MANNED
002002 0002 0001 01 CERTIFIED INSTRUMENTS
            0003 01 ORIGINALLY SPECIFIED IN KM/H
";

/// 301090 is the station group used by the fixtures.
pub const TABLE_D: &str = "\
 301090  2 001015
           007030
 301091  2 004004
           301090
";

/// Write a WMO table set of `version` into `dir`. Table C is optional.
pub fn write_tables(dir: &Path, version: u8, with_c: bool) {
    let name = |t: char| format!("{}000{:05}{:05}{:03}{:03}.TXT", t, 0, 0, version, 0);
    std::fs::write(dir.join(name('B')), table_b()).unwrap();
    std::fs::write(dir.join(name('D')), TABLE_D).unwrap();
    if with_c {
        std::fs::write(dir.join(name('C')), TABLE_C).unwrap();
    }
}

pub fn config(dir: &Path) -> DecoderConfig {
    DecoderConfig::new(TablesConfig::new(dir))
}

/// Section 1 to 4 fields of a test message.
pub struct MessageSpec {
    pub edition: u8,
    pub master_version: u8,
    pub centre: u16,
    pub subsets: u16,
    pub compressed: bool,
    pub month: u8,
    pub descriptors: Vec<&'static str>,
    pub data: Vec<u8>,
    pub section2: Option<Vec<u8>>,
}

impl MessageSpec {
    pub fn new(descriptors: Vec<&'static str>, data: Vec<u8>) -> Self {
        MessageSpec {
            edition: 4,
            master_version: 13,
            centre: 0,
            subsets: 1,
            compressed: false,
            month: 6,
            descriptors,
            data,
            section2: None,
        }
    }

    pub fn edition(mut self, edition: u8) -> Self {
        self.edition = edition;
        self
    }

    pub fn subsets(mut self, subsets: u16, compressed: bool) -> Self {
        self.subsets = subsets;
        self.compressed = compressed;
        self
    }

    pub fn master_version(mut self, version: u8) -> Self {
        self.master_version = version;
        self
    }

    pub fn centre(mut self, centre: u16) -> Self {
        self.centre = centre;
        self
    }

    pub fn month(mut self, month: u8) -> Self {
        self.month = month;
        self
    }

    pub fn section2(mut self, data: Vec<u8>) -> Self {
        self.section2 = Some(data);
        self
    }

    fn section1(&self) -> Vec<u8> {
        let flags = if self.section2.is_some() { 0x80 } else { 0 };
        let mut s = vec![];
        if self.edition == 4 {
            s.push(0);
            s.extend(self.centre.to_be_bytes());
            s.extend(0u16.to_be_bytes());
            s.extend([0, flags, 0, 0, 0, self.master_version, 0]);
            s.extend(2024u16.to_be_bytes());
            s.extend([self.month, 15, 12, 30, 0]);
        } else {
            s.extend([0, 0, self.centre as u8, 0, flags, 0, 0, self.master_version, 0]);
            s.extend([24, self.month, 15, 12, 30, 0]);
        }
        with_length(s)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = self.section1();

        if let Some(data) = &self.section2 {
            let mut s = vec![0];
            s.extend(data);
            body.extend(with_length(s));
        }

        let mut s3 = vec![0];
        s3.extend(self.subsets.to_be_bytes());
        let mut flags = 0x80;
        if self.compressed {
            flags |= 0x40;
        }
        s3.push(flags);
        for key in &self.descriptors {
            let fxy: tablelib::FXY = key.parse().unwrap();
            s3.extend(fxy.to_bytes());
        }
        if self.edition < 4 && s3.len() % 2 == 0 {
            s3.push(0);
        }
        body.extend(with_length(s3));

        let mut s4 = vec![0];
        s4.extend(&self.data);
        if self.edition < 4 && s4.len() % 2 == 0 {
            s4.push(0);
        }
        body.extend(with_length(s4));

        let total = 8 + body.len() + 4;
        let mut out = b"BUFR".to_vec();
        out.extend(&(total as u32).to_be_bytes()[1..]);
        out.push(self.edition);
        out.extend(body);
        out.extend(b"7777");
        out
    }
}

/// Prefix `body` with its 3-byte length, counting the length itself.
fn with_length(body: Vec<u8>) -> Vec<u8> {
    let len = body.len() + 3;
    let mut out = (len as u32).to_be_bytes()[1..].to_vec();
    out.extend(body);
    out
}
