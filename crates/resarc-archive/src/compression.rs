//! Bounded payload decompression
//!
//! Decoders write straight into the caller's destination slice, which is
//! cut to the entry's declared decompressed size. Nothing grows with the
//! size of the compressed input.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{ArchiveError, ArchiveResult};
use crate::format::Codec;

/// Decompress `input` into `output`, which must be filled exactly
///
/// `output.len()` is the declared decompressed size.
pub fn decompress_into(codec: Codec, input: &[u8], output: &mut [u8]) -> ArchiveResult<()> {
    match codec {
        Codec::None => Err(ArchiveError::decompression(
            "archive declares no codec for a compressed entry",
        )),
        Codec::Lz4 => decompress_lz4(input, output),
        Codec::Zlib => decompress_zlib(input, output),
    }
}

fn decompress_lz4(input: &[u8], output: &mut [u8]) -> ArchiveResult<()> {
    let written = lz4_flex::block::decompress_into(input, output)
        .map_err(|e| ArchiveError::decompression(format!("LZ4 decompression failed: {e}")))?;

    if written != output.len() {
        return Err(ArchiveError::decompression(format!(
            "LZ4 decompression size mismatch: expected {}, got {written}",
            output.len()
        )));
    }

    Ok(())
}

fn decompress_zlib(input: &[u8], output: &mut [u8]) -> ArchiveResult<()> {
    let mut decoder = Decompress::new(true);
    let status = decoder
        .decompress(input, output, FlushDecompress::Finish)
        .map_err(|e| ArchiveError::decompression(format!("ZLib decompression failed: {e}")))?;

    let written = decoder.total_out();
    if written != output.len() as u64 {
        return Err(ArchiveError::decompression(format!(
            "ZLib decompression size mismatch: expected {}, got {written}",
            output.len()
        )));
    }

    // A full buffer without reaching the end of the stream means the
    // payload holds more data than declared
    if status != Status::StreamEnd {
        return Err(ArchiveError::decompression(format!(
            "ZLib stream exceeds declared size of {} bytes",
            output.len()
        )));
    }

    let consumed = decoder.total_in();
    if consumed != input.len() as u64 {
        return Err(ArchiveError::decompression(format!(
            "ZLib stream ends after {consumed} of {} stored bytes",
            input.len()
        )));
    }

    Ok(())
}
