use crate::block::{BUFRFile, MessageBlock};
use crate::errors::{Error, Result};
use crate::gts::GtsHeader;
use flate2::read::GzDecoder;
use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Seek, SeekFrom},
    path::Path,
};
use tracing::{debug, warn};

const BUFR_PATTERN: &[u8] = b"BUFR";
const BUFFER_SIZE: usize = 8192;
/// How far back from `BUFR` to look for a GTS heading.
const PREAMBLE_SIZE: u64 = 128;

pub fn parse<P: AsRef<Path>>(path: P) -> Result<BUFRFile> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut magic_bytes = [0u8; 2];
    let is_gzip = match reader.read_exact(&mut magic_bytes) {
        Ok(()) => magic_bytes == [0x1F, 0x8B],
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e.into()),
    };
    reader.seek(SeekFrom::Start(0))?;

    if is_gzip {
        debug!(path = %path.display(), "gzip input");
        let mut gz_decoder = GzDecoder::new(reader);
        let mut bytes = vec![];
        gz_decoder.read_to_end(&mut bytes)?;

        parse_inner(&mut Cursor::new(bytes))
    } else {
        parse_inner(&mut reader)
    }
}

/// Same as [`parse`] for bytes already in memory.
pub fn parse_bytes(bytes: &[u8]) -> Result<BUFRFile> {
    if bytes.starts_with(&[0x1F, 0x8B]) {
        let mut inflated = vec![];
        GzDecoder::new(bytes).read_to_end(&mut inflated)?;
        return parse_inner(&mut Cursor::new(inflated));
    }
    parse_inner(&mut Cursor::new(bytes))
}

fn find_bufr_offsets<R: Read + Seek>(reader: &mut R) -> Result<Vec<u64>> {
    let mut offsets = Vec::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut file_offset = 0u64;
    let mut overlap = vec![0u8; BUFR_PATTERN.len() - 1];
    let mut overlap_len = 0;

    reader.seek(SeekFrom::Start(0))?;

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }

        let mut search_buffer = Vec::with_capacity(overlap_len + bytes_read);
        search_buffer.extend_from_slice(&overlap[..overlap_len]);
        search_buffer.extend_from_slice(&buffer[..bytes_read]);

        for (i, window) in search_buffer.windows(BUFR_PATTERN.len()).enumerate() {
            if window == BUFR_PATTERN {
                offsets.push(file_offset - overlap_len as u64 + i as u64);
            }
        }

        let keep = (BUFR_PATTERN.len() - 1).min(search_buffer.len());
        overlap[..keep].copy_from_slice(&search_buffer[search_buffer.len() - keep..]);
        overlap_len = keep;

        file_offset += bytes_read as u64;
    }

    Ok(offsets)
}

/// Bytes from `offset` up to the declared message end, clipped to the input.
/// Truncation is left for the framing checks to report.
fn read_message_at_offset<R: Read + Seek>(reader: &mut R, offset: u64, end: u64) -> Result<Vec<u8>> {
    let available = end.saturating_sub(offset);
    if available < 8 {
        return Err(Error::Framing(format!(
            "only {} bytes after BUFR at offset {}",
            available, offset
        )));
    }

    reader.seek(SeekFrom::Start(offset))?;
    let mut section0_buf = [0u8; 8];
    reader.read_exact(&mut section0_buf)?;

    let total_length = u32::from_be_bytes([0, section0_buf[4], section0_buf[5], section0_buf[6]]) as u64;
    let length = total_length.max(8).min(available);

    let mut message_buf = vec![0u8; length as usize];
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(&mut message_buf)?;

    Ok(message_buf)
}

fn read_preamble<R: Read + Seek>(reader: &mut R, from: u64, offset: u64) -> Result<Vec<u8>> {
    let start = from.max(offset.saturating_sub(PREAMBLE_SIZE));
    let mut preamble = vec![0u8; (offset - start) as usize];
    reader.seek(SeekFrom::Start(start))?;
    reader.read_exact(&mut preamble)?;
    Ok(preamble)
}

fn parse_inner<R>(buf_reader: &mut R) -> Result<BUFRFile>
where
    R: Read + Seek,
{
    let end = buf_reader.seek(SeekFrom::End(0))?;
    let offsets = find_bufr_offsets(buf_reader)?;
    let mut file_block = BUFRFile::new();
    let mut consumed = 0u64;
    let mut failures = 0usize;

    for offset in offsets {
        // A `BUFR` inside an accepted message is data, not a new message.
        if offset < consumed {
            continue;
        }

        let message = read_message_at_offset(buf_reader, offset, end)
            .and_then(|data| MessageBlock::parse(&data).map(|m| (m, data.len())));

        match message {
            Ok((block, len)) => {
                let preamble = read_preamble(buf_reader, consumed, offset)?;
                let gts = GtsHeader::find(&preamble);
                debug!(offset, length = len, gts = ?gts.as_ref().map(|g| g.to_string()), "message");

                file_block.push_message(block.with_origin(offset, gts));
                consumed = offset + len as u64;
            }
            Err(e) => {
                failures += 1;
                warn!("Failed to parse BUFR message at offset {}: {}", offset, e);
            }
        }
    }

    if file_block.message_count() == 0 {
        return Err(Error::Framing(format!(
            "no BUFR message found ({} candidates rejected)",
            failures
        )));
    }

    Ok(file_block)
}
