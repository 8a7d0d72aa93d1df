// RP66 visible-record unwrap (spec §4.1, layer 3).
//
// Presents the concatenation of every visible record's payload (LRS
// headers and data; the record assembler in `record.rs` is the one that
// interprets LRS structure) as one contiguous logical stream, transparently
// skipping the 4-byte VR header whenever a read crosses a VR boundary —
// which can happen in the middle of a logical record segment, since VR
// framing is independent of LRS framing.

use super::{ByteSource, VR_FORMAT_VERSION};
use crate::util::status::{Fault, FaultKind};

#[derive(Debug, Clone, Copy)]
struct VrSegment {
    logical_start: u64,
    physical_data_start: u64,
    length: u64,
}

pub struct VrlSource<S: ByteSource> {
    inner: S,
    first_vr_physical: u64,
    segments: Vec<VrSegment>,
    logical_pos: u64,
    ended: bool,
}

impl<S: ByteSource> VrlSource<S> {
    pub fn new(inner: S, first_vr_physical: u64) -> Self {
        Self {
            inner,
            first_vr_physical,
            segments: Vec::new(),
            logical_pos: 0,
            ended: false,
        }
    }

    fn read_vr_header(&mut self, physical: u64) -> Result<Option<(u64, u64)>, Fault> {
        self.inner.seek(physical)?;
        let header = self.inner.read(4)?;
        if header.len() < 4 {
            return Ok(None);
        }
        let length = u16::from_be_bytes([header[0], header[1]]) as u64;
        let version = u16::from_be_bytes([header[2], header[3]]);
        if version != VR_FORMAT_VERSION {
            return Err(Fault::new(
                FaultKind::InvalidFormatVersion,
                Some("Incorrect format version"),
            ));
        }
        if length < 4 {
            return Err(Fault::new(
                FaultKind::ShortLogicalRecord,
                Some("Too short logical record"),
            ));
        }
        Ok(Some((physical + 4, length - 4)))
    }

    fn extend_to(&mut self, logical_target: u64) -> Result<(), Fault> {
        loop {
            let (logical_end, next_physical) = match self.segments.last() {
                Some(s) => (
                    s.logical_start + s.length,
                    s.physical_data_start + s.length,
                ),
                None => (0, self.first_vr_physical),
            };
            if logical_end > logical_target || self.ended {
                return Ok(());
            }
            match self.read_vr_header(next_physical)? {
                None => {
                    self.ended = true;
                    return Ok(());
                }
                Some((physical_data_start, length)) => {
                    if length == 0 {
                        self.ended = true;
                        return Ok(());
                    }
                    self.segments.push(VrSegment {
                        logical_start: logical_end,
                        physical_data_start,
                        length,
                    });
                }
            }
        }
    }

    fn locate(&mut self, logical: u64) -> Result<Option<VrSegment>, Fault> {
        self.extend_to(logical)?;
        Ok(self
            .segments
            .iter()
            .find(|s| logical >= s.logical_start && logical < s.logical_start + s.length)
            .copied())
    }
}

impl<S: ByteSource> ByteSource for VrlSource<S> {
    fn seek(&mut self, abs: u64) -> Result<(), Fault> {
        self.logical_pos = abs;
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, Fault> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let seg = match self.locate(self.logical_pos)? {
                Some(s) => s,
                None => break,
            };
            let offset_in_seg = self.logical_pos - seg.logical_start;
            let avail = seg.length - offset_in_seg;
            let want = (n - out.len()) as u64;
            let take = avail.min(want);
            self.inner.seek(seg.physical_data_start + offset_in_seg)?;
            let chunk = self.inner.read(take as usize)?;
            if chunk.len() < take as usize {
                out.extend_from_slice(&chunk);
                self.logical_pos += chunk.len() as u64;
                break;
            }
            out.extend_from_slice(&chunk);
            self.logical_pos += take;
        }
        Ok(out)
    }

    fn ptell(&mut self) -> Result<u64, Fault> {
        Ok(self.logical_pos)
    }

    fn eof(&mut self) -> Result<bool, Fault> {
        Ok(self.locate(self.logical_pos)?.is_none())
    }
}
