//! Deterministic little-endian binary codec with bounded reads.
//!
//! `Encoder` appends to a growable buffer; `Decoder` walks a borrowed slice
//! with a cursor, checking every length-prefixed read against a `Limits`
//! before it touches the underlying bytes, so a corrupt or adversarial
//! buffer can never make the decoder allocate more than the configured
//! bound.

use byteorder::{ByteOrder, LittleEndian};
use wax_core::{Limits, WaxError, WaxResult};

/// Appends little-endian primitives to an in-memory buffer.
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Encoder { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Encoder {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        let mut tmp = [0u8; 2];
        LittleEndian::write_u16(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn put_u32(&mut self, v: u32) {
        let mut tmp = [0u8; 4];
        LittleEndian::write_u32(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn put_u64(&mut self, v: u64) {
        let mut tmp = [0u8; 8];
        LittleEndian::write_u64(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn put_i64(&mut self, v: i64) {
        self.put_u64(v as u64);
    }

    pub fn put_bytes_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// `u32` length prefix followed by raw bytes.
    pub fn put_blob(&mut self, bytes: &[u8]) -> WaxResult<()> {
        let len: u32 = bytes
            .len()
            .try_into()
            .map_err(|_| WaxError::encoding_error("blob length exceeds u32"))?;
        self.put_u32(len);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// `u32` length prefix + UTF-8 bytes.
    pub fn put_string(&mut self, s: &str) -> WaxResult<()> {
        self.put_blob(s.as_bytes())
    }

    /// `u8` tag (0 absent, 1 present) + payload if present.
    pub fn put_optional_string(&mut self, s: Option<&str>) -> WaxResult<()> {
        match s {
            None => self.put_u8(0),
            Some(v) => {
                self.put_u8(1);
                self.put_string(v)?;
            }
        }
        Ok(())
    }

    pub fn put_optional_u64(&mut self, v: Option<u64>) {
        match v {
            None => self.put_u8(0),
            Some(v) => {
                self.put_u8(1);
                self.put_u64(v);
            }
        }
    }

    pub fn put_optional_u32(&mut self, v: Option<u32>) {
        match v {
            None => self.put_u8(0),
            Some(v) => {
                self.put_u8(1);
                self.put_u32(v);
            }
        }
    }

    pub fn put_optional_fixed32(&mut self, v: Option<&[u8; 32]>) {
        match v {
            None => self.put_u8(0),
            Some(v) => {
                self.put_u8(1);
                self.put_bytes_fixed(v);
            }
        }
    }

    /// `u32` element count, then the caller writes each element via `f`.
    pub fn put_array<T>(&mut self, items: &[T], mut f: impl FnMut(&mut Self, &T) -> WaxResult<()>) -> WaxResult<()> {
        let count: u32 = items
            .len()
            .try_into()
            .map_err(|_| WaxError::encoding_error("array count exceeds u32"))?;
        self.put_u32(count);
        for item in items {
            f(self, item)?;
        }
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks a borrowed byte slice, decoding length-prefixed primitives with
/// bounds checks against a `Limits`.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    limits: &'a Limits,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8], limits: &'a Limits) -> Self {
        Decoder { buf, pos: 0, limits }
    }

    fn take(&mut self, n: usize) -> WaxResult<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(WaxError::decoding_error(format!(
                "buffer underrun: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.buf.len()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> WaxResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16(&mut self) -> WaxResult<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn get_u32(&mut self) -> WaxResult<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn get_u64(&mut self) -> WaxResult<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn get_i64(&mut self) -> WaxResult<i64> {
        Ok(self.get_u64()? as i64)
    }

    pub fn get_bytes_fixed(&mut self, n: usize) -> WaxResult<&'a [u8]> {
        self.take(n)
    }

    pub fn get_blob(&mut self) -> WaxResult<Vec<u8>> {
        let len = self.get_u32()? as u64;
        self.limits
            .check_blob_bytes(len)
            .map_err(|e| WaxError::decoding_error(e.to_string()))?;
        Ok(self.take(len as usize)?.to_vec())
    }

    pub fn get_string(&mut self) -> WaxResult<String> {
        let len = self.get_u32()? as u64;
        self.limits
            .check_string_bytes(len)
            .map_err(|e| WaxError::decoding_error(e.to_string()))?;
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| WaxError::decoding_error(e.to_string()))
    }

    pub fn get_optional_string(&mut self) -> WaxResult<Option<String>> {
        match self.get_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.get_string()?)),
            tag => Err(WaxError::decoding_error(format!("bad option tag {tag}"))),
        }
    }

    pub fn get_optional_u64(&mut self) -> WaxResult<Option<u64>> {
        match self.get_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.get_u64()?)),
            tag => Err(WaxError::decoding_error(format!("bad option tag {tag}"))),
        }
    }

    pub fn get_optional_u32(&mut self) -> WaxResult<Option<u32>> {
        match self.get_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.get_u32()?)),
            tag => Err(WaxError::decoding_error(format!("bad option tag {tag}"))),
        }
    }

    pub fn get_optional_fixed32(&mut self) -> WaxResult<Option<[u8; 32]>> {
        match self.get_u8()? {
            0 => Ok(None),
            1 => {
                let mut out = [0u8; 32];
                out.copy_from_slice(self.take(32)?);
                Ok(Some(out))
            }
            tag => Err(WaxError::decoding_error(format!("bad option tag {tag}"))),
        }
    }

    pub fn get_array<T>(&mut self, mut f: impl FnMut(&mut Self) -> WaxResult<T>) -> WaxResult<Vec<T>> {
        let count = self.get_u32()? as u64;
        self.limits
            .check_array_count(count)
            .map_err(|e| WaxError::decoding_error(e.to_string()))?;
        let mut out = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            out.push(f(self)?);
        }
        Ok(out)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Requires exact consumption: fails if bytes remain.
    pub fn finish(self) -> WaxResult<()> {
        if self.pos != self.buf.len() {
            return Err(WaxError::decoding_error(format!(
                "{} trailing bytes after decode",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_primitives() {
        let limits = Limits::default();
        let mut enc = Encoder::new();
        enc.put_u8(7);
        enc.put_u32(42);
        enc.put_i64(-5);
        enc.put_string("hello").unwrap();
        let bytes = enc.into_bytes();

        let mut dec = Decoder::new(&bytes, &limits);
        assert_eq!(dec.get_u8().unwrap(), 7);
        assert_eq!(dec.get_u32().unwrap(), 42);
        assert_eq!(dec.get_i64().unwrap(), -5);
        assert_eq!(dec.get_string().unwrap(), "hello");
        dec.finish().unwrap();
    }

    #[test]
    fn finish_rejects_trailing_bytes() {
        let limits = Limits::default();
        let mut enc = Encoder::new();
        enc.put_u32(1);
        enc.put_u32(2);
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes, &limits);
        dec.get_u32().unwrap();
        assert!(dec.finish().is_err());
    }

    #[test]
    fn blob_over_limit_rejected() {
        let limits = Limits::with_small_limits();
        let mut enc = Encoder::new();
        let big = vec![0u8; (limits.max_blob_bytes + 1) as usize];
        enc.put_u32(big.len() as u32);
        enc.put_bytes_fixed(&big);
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes, &limits);
        assert!(dec.get_blob().is_err());
    }

    #[test]
    fn truncated_buffer_errors_not_panics() {
        let limits = Limits::default();
        let bytes = [1u8, 2, 3];
        let mut dec = Decoder::new(&bytes, &limits);
        assert!(dec.get_u64().is_err());
    }

    #[test]
    fn optional_round_trip() {
        let limits = Limits::default();
        let mut enc = Encoder::new();
        enc.put_optional_string(Some("x")).unwrap();
        enc.put_optional_string(None).unwrap();
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes, &limits);
        assert_eq!(dec.get_optional_string().unwrap(), Some("x".to_string()));
        assert_eq!(dec.get_optional_string().unwrap(), None);
    }
}
