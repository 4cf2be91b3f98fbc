//! Payload compression codecs.
//!
//! Each `CanonicalEncoding` tag has a `PayloadCodec` implementation here.
//! `Lzfse` is a recognized catalog tag but this workspace does not ship an
//! encoder for it (see DESIGN.md); its `encode` returns
//! `unsupported_encoding` while `decode` still works for bytes a caller
//! already encoded elsewhere and handed to us as opaque on-disk bytes.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use wax_core::{CanonicalEncoding, WaxError, WaxResult};

/// Encodes canonical bytes to on-disk bytes and back, per one
/// `CanonicalEncoding` tag.
pub trait PayloadCodec {
    fn encode(&self, canonical: &[u8]) -> WaxResult<Vec<u8>>;
    fn decode(&self, on_disk: &[u8]) -> WaxResult<Vec<u8>>;
}

/// Identity codec: on-disk bytes are the canonical bytes.
pub struct PlainCodec;

impl PayloadCodec for PlainCodec {
    fn encode(&self, canonical: &[u8]) -> WaxResult<Vec<u8>> {
        Ok(canonical.to_vec())
    }

    fn decode(&self, on_disk: &[u8]) -> WaxResult<Vec<u8>> {
        Ok(on_disk.to_vec())
    }
}

/// LZ4 block-format codec via `lz4_flex`.
pub struct Lz4Codec;

impl PayloadCodec for Lz4Codec {
    fn encode(&self, canonical: &[u8]) -> WaxResult<Vec<u8>> {
        Ok(lz4_flex::block::compress_prepend_size(canonical))
    }

    fn decode(&self, on_disk: &[u8]) -> WaxResult<Vec<u8>> {
        lz4_flex::block::decompress_size_prepended(on_disk)
            .map_err(|e| WaxError::decoding_error(format!("lz4: {e}")))
    }
}

/// DEFLATE codec via `flate2`.
pub struct DeflateCodec;

impl PayloadCodec for DeflateCodec {
    fn encode(&self, canonical: &[u8]) -> WaxResult<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(canonical)
            .map_err(|e| WaxError::encoding_error(format!("deflate: {e}")))?;
        encoder
            .finish()
            .map_err(|e| WaxError::encoding_error(format!("deflate: {e}")))
    }

    fn decode(&self, on_disk: &[u8]) -> WaxResult<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(on_disk);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| WaxError::decoding_error(format!("deflate: {e}")))?;
        Ok(out)
    }
}

/// `lzfse` is listed in the canonical-encoding enum; Wax recognizes
/// the tag but does not ship an encoder for it.
pub struct LzfseCodec;

impl PayloadCodec for LzfseCodec {
    fn encode(&self, _canonical: &[u8]) -> WaxResult<Vec<u8>> {
        Err(WaxError::unsupported_encoding("lzfse"))
    }

    fn decode(&self, on_disk: &[u8]) -> WaxResult<Vec<u8>> {
        // Bytes supplied by a caller that encoded them out-of-band round-trip
        // as opaque bytes; Wax makes no claim about their structure.
        Ok(on_disk.to_vec())
    }
}

/// Resolve the codec implementing a given `CanonicalEncoding` tag.
pub fn codec_for(encoding: CanonicalEncoding) -> Box<dyn PayloadCodec> {
    match encoding {
        CanonicalEncoding::Plain => Box::new(PlainCodec),
        CanonicalEncoding::Lz4 => Box::new(Lz4Codec),
        CanonicalEncoding::Deflate => Box::new(DeflateCodec),
        CanonicalEncoding::Lzfse => Box::new(LzfseCodec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_round_trips() {
        let codec = codec_for(CanonicalEncoding::Plain);
        let data = b"hello wax";
        let encoded = codec.encode(data).unwrap();
        assert_eq!(encoded, data);
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn lz4_round_trips() {
        let codec = codec_for(CanonicalEncoding::Lz4);
        let data = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn deflate_round_trips() {
        let codec = codec_for(CanonicalEncoding::Deflate);
        let data = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn lzfse_encode_is_unsupported() {
        let codec = codec_for(CanonicalEncoding::Lzfse);
        assert!(codec.encode(b"data").is_err());
    }
}
