//! Framing for moving a finished source result between processes.
//!
//! ```text
//! "WFRQ" | version: u8
//! tokens: u64 LE | counted: u64 LE | rejected: u64 LE | overflowed: u64 LE
//! ( len: u16 LE | word: len bytes | count: u64 LE )*
//! 0u16                                  end marker
//! ```
//!
//! Words are canonical, so they are never shorter than three bytes and a zero
//! length can only be the end marker.

use std::io::{self, Read, Write};

use thiserror::Error;
use wordfreq_types::CanonicalWord;

use crate::table::FrequencyTable;
use crate::tokenizer::ChunkStats;

pub const MAGIC: &[u8; 4] = b"WFRQ";
pub const VERSION: u8 = 2;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("stream ended before the end marker")]
    Truncated,
    #[error("stream does not start with the table magic")]
    BadMagic,
    #[error("unsupported table version {0}")]
    UnsupportedVersion(u8),
    #[error("record {0} does not hold a canonical word")]
    InvalidWord(usize),
    #[error("record {0} has a zero count")]
    ZeroCount(usize),
    #[error("record {0} repeats a word")]
    DuplicateWord(usize),
    #[error("word of {0} bytes does not fit a record")]
    WordTooLong(usize),
    #[error("{0} bytes after the end marker")]
    TrailingBytes(usize),
}

/// Write `stats`, then `table` in discovery order, then the end marker.
pub fn encode<W: Write>(
    table: &FrequencyTable,
    stats: &ChunkStats,
    mut writer: W,
) -> Result<(), WireError> {
    writer.write_all(MAGIC)?;
    writer.write_all(&[VERSION])?;
    for field in [stats.tokens, stats.counted, stats.rejected, stats.overflowed] {
        writer.write_all(&field.to_le_bytes())?;
    }
    for (word, count) in table.entries() {
        let len = u16::try_from(word.len()).map_err(|_| WireError::WordTooLong(word.len()))?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(word.as_bytes())?;
        writer.write_all(&count.to_le_bytes())?;
    }
    writer.write_all(&0u16.to_le_bytes())?;
    Ok(())
}

/// Read one result up to and including its end marker.
pub fn decode<R: Read>(mut reader: R) -> Result<(FrequencyTable, ChunkStats), WireError> {
    let mut magic = [0u8; 4];
    read_exact(&mut reader, &mut magic)?;
    if &magic != MAGIC {
        return Err(WireError::BadMagic);
    }
    let mut version = [0u8; 1];
    read_exact(&mut reader, &mut version)?;
    if version[0] != VERSION {
        return Err(WireError::UnsupportedVersion(version[0]));
    }
    let stats = ChunkStats {
        tokens: read_u64(&mut reader)?,
        counted: read_u64(&mut reader)?,
        rejected: read_u64(&mut reader)?,
        overflowed: read_u64(&mut reader)?,
    };

    let table = FrequencyTable::new();
    let mut word_buf = Vec::new();
    for record in 0.. {
        let mut len = [0u8; 2];
        read_exact(&mut reader, &mut len)?;
        let len = u16::from_le_bytes(len) as usize;
        if len == 0 {
            break;
        }

        word_buf.resize(len, 0);
        read_exact(&mut reader, &mut word_buf)?;
        let count = read_u64(&mut reader)?;

        let word =
            CanonicalWord::parse_canonical(&word_buf).ok_or(WireError::InvalidWord(record))?;
        if count == 0 {
            return Err(WireError::ZeroCount(record));
        }
        if !table.try_insert(word, count) {
            return Err(WireError::DuplicateWord(record));
        }
    }
    Ok((table, stats))
}

/// Decode a complete buffer, rejecting anything after the end marker.
pub fn decode_all(mut bytes: &[u8]) -> Result<(FrequencyTable, ChunkStats), WireError> {
    let decoded = decode(&mut bytes)?;
    if !bytes.is_empty() {
        return Err(WireError::TrailingBytes(bytes.len()));
    }
    Ok(decoded)
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, WireError> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), WireError> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => WireError::Truncated,
        _ => WireError::Io(err),
    })
}
