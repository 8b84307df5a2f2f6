//! Content-coding support.
//!
//! # Responsibilities
//! - Encode/decode bodies by `Content-Encoding` token
//! - Pick the first `Accept-Encoding` token that actually shrinks a body
//!
//! # Tokens
//! `gzip`, `br`/`brotli`, `deflate`, `zstd`; `plain`, `identity` and the empty
//! token pass bytes through. Anything else is an error.

mod codecs;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("unknown encoding: {0}")]
    UnknownToken(String),

    #[error("{coding} codec failed: {source}")]
    Codec {
        coding: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// A supported content coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Identity,
    Gzip,
    Deflate,
    Brotli,
    Zstd,
}

impl ContentCoding {
    pub fn from_token(token: &str) -> Result<Self, EncodingError> {
        match token.trim() {
            "" | "plain" | "identity" => Ok(ContentCoding::Identity),
            "gzip" => Ok(ContentCoding::Gzip),
            "deflate" => Ok(ContentCoding::Deflate),
            "br" | "brotli" => Ok(ContentCoding::Brotli),
            "zstd" => Ok(ContentCoding::Zstd),
            other => Err(EncodingError::UnknownToken(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContentCoding::Identity => "identity",
            ContentCoding::Gzip => "gzip",
            ContentCoding::Deflate => "deflate",
            ContentCoding::Brotli => "br",
            ContentCoding::Zstd => "zstd",
        }
    }

    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>, EncodingError> {
        let result = match self {
            ContentCoding::Identity => return Ok(data.to_vec()),
            ContentCoding::Gzip => codecs::gzip_encode(data),
            ContentCoding::Deflate => codecs::deflate_encode(data),
            ContentCoding::Brotli => codecs::brotli_encode(data),
            ContentCoding::Zstd => codecs::zstd_encode(data),
        };
        result.map_err(|source| EncodingError::Codec {
            coding: self.name(),
            source,
        })
    }

    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>, EncodingError> {
        let result = match self {
            ContentCoding::Identity => return Ok(data.to_vec()),
            ContentCoding::Gzip => codecs::gzip_decode(data),
            ContentCoding::Deflate => codecs::deflate_decode(data),
            ContentCoding::Brotli => codecs::brotli_decode(data),
            ContentCoding::Zstd => codecs::zstd_decode(data),
        };
        result.map_err(|source| EncodingError::Codec {
            coding: self.name(),
            source,
        })
    }
}

/// Encode `data` with the coding named by `token`.
pub fn encode(data: &[u8], token: &str) -> Result<Vec<u8>, EncodingError> {
    ContentCoding::from_token(token)?.encode(data)
}

/// Decode `data` encoded with the coding named by `token`.
pub fn decode(data: &[u8], token: &str) -> Result<Vec<u8>, EncodingError> {
    ContentCoding::from_token(token)?.decode(data)
}

/// Try each `Accept-Encoding` token in header order and return the first
/// encoding strictly smaller than `data`, with the token as written by the
/// client. Falls back to the original bytes and an empty token.
///
/// Quality parameters (`;q=`) are ignored; token order decides.
pub fn negotiate(data: Vec<u8>, accept_encoding: &str) -> Result<(Vec<u8>, String), EncodingError> {
    for chunk in accept_encoding.split(',') {
        let token = chunk.split(';').next().unwrap_or_default().trim();
        if token.is_empty() {
            continue;
        }
        let encoded = encode(&data, token)?;
        if encoded.len() < data.len() {
            return Ok((encoded, token.to_string()));
        }
    }
    Ok((data, String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        "the quick brown fox jumps over the lazy dog. ".repeat(50).into_bytes()
    }

    #[test]
    fn test_codecs_reverse() {
        let data = sample();
        for token in ["gzip", "deflate", "br", "brotli", "zstd", "plain", ""] {
            let encoded = encode(&data, token).unwrap();
            assert_eq!(decode(&encoded, token).unwrap(), data, "token {token:?}");
        }
    }

    #[test]
    fn test_deflate_decodes_zlib_wrapped() {
        use std::io::Write;
        let data = sample();
        let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        zlib.write_all(&data).unwrap();
        let wrapped = zlib.finish().unwrap();
        assert_eq!(decode(&wrapped, "deflate").unwrap(), data);
    }

    #[test]
    fn test_unknown_token_is_error() {
        assert!(matches!(encode(b"x", "lzma"), Err(EncodingError::UnknownToken(_))));
        assert!(matches!(decode(b"x", "compress"), Err(EncodingError::UnknownToken(_))));
        assert!(negotiate(sample(), "gzip, lzma").is_ok());
        assert!(negotiate(sample(), "lzma, gzip").is_err());
    }

    #[test]
    fn test_negotiate_picks_first_shrinking_token() {
        let data = sample();
        let (body, token) = negotiate(data.clone(), "br, gzip").unwrap();
        assert_eq!(token, "br");
        assert_eq!(decode(&body, "br").unwrap(), data);

        let (body, token) = negotiate(data.clone(), " gzip;q=1.0 , br").unwrap();
        assert_eq!(token, "gzip");
        assert!(body.len() < data.len());
    }

    #[test]
    fn test_negotiate_falls_back_to_plain() {
        let tiny = b"hi".to_vec();
        assert_eq!(negotiate(tiny.clone(), "gzip, deflate").unwrap(), (tiny.clone(), String::new()));
        assert_eq!(negotiate(tiny.clone(), "").unwrap(), (tiny.clone(), String::new()));
        assert_eq!(negotiate(tiny.clone(), "identity").unwrap(), (tiny, String::new()));
    }

    #[test]
    fn test_corrupt_input_is_codec_error() {
        assert!(matches!(decode(b"not gzip", "gzip"), Err(EncodingError::Codec { .. })));
    }
}
