use crate::errors::{Error, Result};

/// Read `nbits` (1..=32) bits MSB first starting at bit `*cursor`.
///
/// The cursor only moves on success.
pub fn read_bits(buf: &[u8], cursor: &mut usize, nbits: usize) -> Result<u32> {
    if nbits == 0 || nbits > 32 {
        return Err(Error::InvalidBitWidth(nbits as i64));
    }

    let start = *cursor;
    let available = (buf.len() * 8).saturating_sub(start);
    if nbits > available {
        return Err(Error::BitOverrun {
            offset: start,
            needed: nbits,
            available,
        });
    }

    let first = start / 8;
    let last = (start + nbits - 1) / 8;

    // At most five bytes, so the accumulator never overflows.
    let mut acc = 0u64;
    for &byte in &buf[first..=last] {
        acc = (acc << 8) | byte as u64;
    }

    let shift = (last - first + 1) * 8 - (start % 8) - nbits;
    let mask = (1u64 << nbits) - 1;

    *cursor = start + nbits;
    Ok(((acc >> shift) & mask) as u32)
}

/// All-ones pattern for a field of `nbits` bits.
#[inline]
pub fn all_ones(nbits: usize) -> u64 {
    if nbits >= 64 {
        u64::MAX
    } else {
        (1u64 << nbits) - 1
    }
}

/// Cursor over a borrowed section 4 buffer.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        BitReader { buf, cursor: 0 }
    }

    pub fn at(buf: &'a [u8], position: usize) -> Self {
        BitReader {
            buf,
            cursor: position,
        }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        (self.buf.len() * 8).saturating_sub(self.cursor)
    }

    pub fn read(&mut self, nbits: usize) -> Result<u32> {
        read_bits(self.buf, &mut self.cursor, nbits)
    }

    pub fn read_u64(&mut self, nbits: usize) -> Result<u64> {
        if nbits == 0 || nbits > 64 {
            return Err(Error::InvalidBitWidth(nbits as i64));
        }
        self.ensure(nbits)?;

        if nbits <= 32 {
            return self.read(nbits).map(u64::from);
        }
        let high = self.read(nbits - 32)? as u64;
        let low = self.read(32)? as u64;
        Ok((high << 32) | low)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.ensure(n * 8)?;

        if self.cursor % 8 == 0 {
            let start = self.cursor / 8;
            self.cursor += n * 8;
            return Ok(self.buf[start..start + n].to_vec());
        }

        let mut bytes = Vec::with_capacity(n);
        for _ in 0..n {
            bytes.push(self.read(8)? as u8);
        }
        Ok(bytes)
    }

    fn ensure(&self, nbits: usize) -> Result<()> {
        let available = self.remaining();
        if nbits > available {
            return Err(Error::BitOverrun {
                offset: self.cursor,
                needed: nbits,
                available,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const DATA: [u8; 6] = [0b1010_1100, 0x3C, 0xFF, 0x00, 0x81, 0x7E];

    #[test_case(0, 1, 1)]
    #[test_case(0, 4, 0b1010)]
    #[test_case(4, 8, 0b1100_0011)]
    #[test_case(3, 13, 0b0_1100_0011_1100)]
    #[test_case(16, 8, 0xFF)]
    #[test_case(8, 32, 0x3CFF_0081)]
    #[test_case(5, 32, 0b100_0011_1100_1111_1111_0000_0000_1000_0)]
    fn reads_msb_first(offset: usize, nbits: usize, expected: u32) {
        let mut cursor = offset;
        assert_eq!(read_bits(&DATA, &mut cursor, nbits).unwrap(), expected);
        assert_eq!(cursor, offset + nbits);
    }

    #[test]
    fn split_reads_compose() {
        for offset in 0..16 {
            let mut cursor = offset;
            let whole = read_bits(&DATA, &mut cursor, 32).unwrap();

            for l in 1..32 {
                let mut cursor = offset;
                let hi = read_bits(&DATA, &mut cursor, l).unwrap();
                let lo = read_bits(&DATA, &mut cursor, 32 - l).unwrap();
                assert_eq!(((hi as u64) << (32 - l)) | lo as u64, whole as u64);
            }
        }
    }

    #[test]
    fn overrun_leaves_cursor() {
        let mut cursor = 40;
        let err = read_bits(&DATA, &mut cursor, 9).unwrap_err();
        assert!(matches!(err, Error::BitOverrun { needed: 9, available: 8, .. }));
        assert_eq!(cursor, 40);

        assert_eq!(read_bits(&DATA, &mut cursor, 8).unwrap(), 0x7E);
        assert!(read_bits(&DATA, &mut cursor, 1).is_err());
    }

    #[test_case(0)]
    #[test_case(33)]
    fn rejects_widths(nbits: usize) {
        let mut cursor = 0;
        assert!(matches!(
            read_bits(&DATA, &mut cursor, nbits),
            Err(Error::InvalidBitWidth(_))
        ));
        assert_eq!(cursor, 0);
    }

    #[test]
    fn reader_wide_and_bytes() {
        let mut reader = BitReader::new(&DATA);
        assert_eq!(reader.read_u64(40).unwrap(), 0xAC3C_FF00_81);
        assert_eq!(reader.remaining(), 8);
        assert!(reader.read_u64(9).is_err());
        assert_eq!(reader.position(), 40);

        let mut reader = BitReader::at(&DATA, 4);
        assert_eq!(reader.read_bytes(2).unwrap(), vec![0xC3, 0xCF]);
        let mut reader = BitReader::at(&DATA, 8);
        assert_eq!(reader.read_bytes(2).unwrap(), vec![0x3C, 0xFF]);
        assert_eq!(reader.position(), 24);
        assert!(reader.read_bytes(4).is_err());
    }
}
