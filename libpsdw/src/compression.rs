//! Scanline codecs for channel data.
//!
//! Every function here works on plain byte buffers and knows nothing about the
//! document layout. Row based codecs take the row width and treat the buffer as
//! `len / width` consecutive rows.

use std::fmt;
use std::io::Write;

use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{PsdError, Result};

/// Longest run or literal a single PackBits control byte can describe
pub const MAX_PACKBITS_RUN: usize = 128;

/// Shortest run of identical bytes that is emitted as a repeat token
pub const MIN_REPEAT_RUN: usize = 3;

/// Channel compression methods understood by PSD readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u16)]
pub enum Compression {
    /// Uncompressed bytes
    Raw = 0,
    /// PackBits run-length encoding, one scanline at a time
    #[default]
    Rle = 1,
    /// zlib stream without preprocessing
    Zip = 2,
    /// zlib stream over horizontally differenced rows
    ZipWithPrediction = 3,
}

impl Compression {
    /// All methods, in tag order
    pub const ALL: [Self; 4] = [Self::Raw, Self::Rle, Self::Zip, Self::ZipWithPrediction];

    /// The 16-bit tag that prefixes every compressed block
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Parse a block tag
    pub fn from_u16(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Rle),
            2 => Ok(Self::Zip),
            3 => Ok(Self::ZipWithPrediction),
            other => Err(PsdError::UnsupportedCompressionMethod(other)),
        }
    }

    /// Short lowercase name, matching the serde representation
    pub fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Rle => "rle",
            Self::Zip => "zip",
            Self::ZipWithPrediction => "zip-with-prediction",
        }
    }
}

impl TryFrom<u16> for Compression {
    type Error = PsdError;

    fn try_from(value: u16) -> Result<Self> {
        Self::from_u16(value)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row lengths and concatenated payload produced by a row based encoder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedRows {
    /// Encoded byte length of every row, in row order
    pub row_lengths: Vec<u16>,
    /// All encoded rows back to back
    pub payload: Vec<u8>,
}

/// Identity codec
pub fn encode_raw(data: &[u8]) -> Vec<u8> {
    data.to_vec()
}

/// Length of the run of identical bytes starting at `start`, capped at 128
fn run_length_at(row: &[u8], start: usize) -> usize {
    let value = row[start];
    row[start..]
        .iter()
        .take(MAX_PACKBITS_RUN)
        .take_while(|&&b| b == value)
        .count()
}

/// True when a repeat token would start at `pos`
fn repeat_starts_at(row: &[u8], pos: usize) -> bool {
    pos + 2 < row.len() && row[pos] == row[pos + 1] && row[pos] == row[pos + 2]
}

/// PackBits-encode one scanline, appending the tokens to `out`.
///
/// Runs of three or more identical bytes become a repeat token
/// (`257 - run`, value). Anything shorter is folded into a literal token
/// (`len - 1`, bytes...) that stops as soon as a repeat could start.
pub fn packbits_encode_row(row: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;

    while i < row.len() {
        let run = run_length_at(row, i);
        if run >= MIN_REPEAT_RUN {
            out.push((257 - run) as u8);
            out.push(row[i]);
            i += run;
            continue;
        }

        let mut literal = 0;
        while i + literal < row.len() && literal < MAX_PACKBITS_RUN {
            if repeat_starts_at(row, i + literal) {
                break;
            }
            literal += 1;
        }

        out.push((literal - 1) as u8);
        out.extend_from_slice(&row[i..i + literal]);
        i += literal;
    }
}

/// PackBits-encode a buffer of `width`-byte rows.
///
/// Fails with [`PsdError::RowTooLarge`] if any encoded row does not fit the
/// 16-bit row length field.
pub fn encode_rle_rows(data: &[u8], width: usize) -> Result<EncodedRows> {
    if width == 0 {
        return Ok(EncodedRows::default());
    }
    debug_assert_eq!(data.len() % width, 0, "buffer is not a whole number of rows");

    let rows = data.len() / width;
    let mut encoded = EncodedRows {
        row_lengths: Vec::with_capacity(rows),
        payload: Vec::with_capacity(data.len() + data.len() / MAX_PACKBITS_RUN + rows),
    };

    for (row_index, row) in data.chunks_exact(width).enumerate() {
        let start = encoded.payload.len();
        packbits_encode_row(row, &mut encoded.payload);
        let length = encoded.payload.len() - start;

        let length = u16::try_from(length).map_err(|_| PsdError::RowTooLarge {
            row: row_index,
            length,
        })?;
        encoded.row_lengths.push(length);
    }

    Ok(encoded)
}

/// Replace every byte but the first of each row with its difference to the
/// previous byte, modulo 256
pub fn predict_rows(data: &mut [u8], width: usize) {
    if width == 0 {
        return;
    }

    for row in data.chunks_exact_mut(width) {
        for x in (1..row.len()).rev() {
            row[x] = row[x].wrapping_sub(row[x - 1]);
        }
    }
}

/// zlib-compress a buffer, favoring ratio over speed
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 2),
        flate2::Compression::best(),
    );
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Apply the horizontal predictor to a copy of `data`, then deflate it
pub fn deflate_predicted(data: &[u8], width: usize) -> Result<Vec<u8>> {
    let mut predicted = data.to_vec();
    predict_rows(&mut predicted, width);
    deflate(&predicted)
}
