// Fixed-width big-endian decoding over a byte slice.
//
// RP66 is big-endian throughout, the mirror image of the little-endian
// `util::coding` helpers in the storage engine this crate is adapted from.
// Kept as free functions over a `Cursor` rather than a trait so every
// representation-code decoder in `codec.rs` can compose them without
// indirection.

use crate::util::status::{Fault, FaultKind};

/// A forward-only cursor over a borrowed byte slice, tracking how many
/// bytes have been consumed so callers can report `bytes_read` alongside
/// a decoded value (spec §4.3).
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn overrun() -> Fault {
        Fault::new(FaultKind::FrameFmtOverrun, Some("fmtstr would read past end"))
    }

    /// Takes `n` bytes without interpreting them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Fault> {
        if self.remaining() < n {
            return Err(Self::overrun());
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn peek(&self, n: usize) -> Result<&'a [u8], Fault> {
        if self.remaining() < n {
            return Err(Self::overrun());
        }
        Ok(&self.buf[self.pos..self.pos + n])
    }

    pub fn u8(&mut self) -> Result<u8, Fault> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, Fault> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, Fault> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i8(&mut self) -> Result<i8, Fault> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn i16(&mut self) -> Result<i16, Fault> {
        Ok(self.u16()? as i16)
    }

    pub fn i32(&mut self) -> Result<i32, Fault> {
        Ok(self.u32()? as i32)
    }

    pub fn f32(&mut self) -> Result<f32, Fault> {
        Ok(f32::from_bits(self.u32()?))
    }

    pub fn f64(&mut self) -> Result<f64, Fault> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(f64::from_be_bytes(arr))
    }
}

/// Decodes a big-endian `u64` from a fixed 8-byte slice (used by the DTIME
/// and checksum-adjacent framing code that wants a plain function rather
/// than a `Cursor`).
pub fn decode_fixed_64(src: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&src[..8]);
    u64::from_be_bytes(arr)
}
