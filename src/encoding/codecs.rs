//! Byte-level compressors behind each content-coding token.

use std::io::{self, Read, Write};

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;

const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_WINDOW: u32 = 22;
const ZSTD_LEVEL: i32 = 3;

pub fn gzip_encode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn gzip_decode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Raw DEFLATE stream, no zlib wrapper.
pub fn deflate_encode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Accepts both zlib-wrapped and raw DEFLATE, since servers send either.
pub fn deflate_decode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    if ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }
    out.clear();
    DeflateDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

pub fn brotli_encode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut writer = brotli::CompressorWriter::new(Vec::new(), BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_WINDOW);
    writer.write_all(data)?;
    writer.flush()?;
    Ok(writer.into_inner())
}

pub fn brotli_decode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    brotli::Decompressor::new(data, BROTLI_BUFFER).read_to_end(&mut out)?;
    Ok(out)
}

pub fn zstd_encode(data: &[u8]) -> io::Result<Vec<u8>> {
    zstd::encode_all(data, ZSTD_LEVEL)
}

pub fn zstd_decode(data: &[u8]) -> io::Result<Vec<u8>> {
    zstd::decode_all(data)
}
