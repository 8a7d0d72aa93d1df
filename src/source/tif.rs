// Tape-image format (TIF) unwrap (spec §4.1, layer 2; §9 open question).
//
// Every 12-byte tape mark (`type: u32 LE`, `prev: u32 LE`, `next: u32 LE`)
// is stripped so callers see a contiguous logical byte stream. Segments are
// discovered lazily by following `next` forward from the mark at offset 0,
// and cached so a later `seek` to an already-visited logical offset does
// not require rescanning the marks (spec: "building a random-access index
// so later reads can seek ... without rescanning").

use super::ByteSource;
use crate::util::status::Fault;

#[derive(Debug, Clone, Copy)]
struct Segment {
    logical_start: u64,
    physical_start: u64,
    length: u64,
}

pub struct TifSource<S: ByteSource> {
    inner: S,
    segments: Vec<Segment>,
    logical_pos: u64,
    logical_len_known: Option<u64>,
}

fn read_mark(inner: &mut impl ByteSource, physical: u64) -> Result<(u32, u32, u32), Fault> {
    inner.seek(physical)?;
    let raw = inner.read_exact_or_eof(12)?;
    let ty = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    let prev = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    let next = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
    Ok((ty, prev, next))
}

impl<S: ByteSource> TifSource<S> {
    /// Probes the first two tape marks: detection requires both to report
    /// a plausible `{type, prev, next}` triple and to chain consistently
    /// (mark 2's `prev` equals mark 1's `next`), avoiding the false
    /// positive the spec's open question calls out.
    pub fn probe(inner: &mut S) -> Result<bool, Fault> {
        let (ty0, prev0, next0) = match read_mark(inner, 0) {
            Ok(m) => m,
            Err(_) => return Ok(false),
        };
        if !(ty0 == 0 || ty0 == 1) || prev0 != 0 {
            return Ok(false);
        }
        let second_physical = 12 + next0 as u64;
        let (ty1, prev1, _next1) = match read_mark(inner, second_physical) {
            Ok(m) => m,
            Err(_) => return Ok(false),
        };
        if !(ty1 == 0 || ty1 == 1) {
            return Ok(false);
        }
        Ok(prev1 == next0)
    }

    pub fn new(inner: S) -> Self {
        Self {
            inner,
            segments: Vec::new(),
            logical_pos: 0,
            logical_len_known: None,
        }
    }

    /// Ensures segments are known up to (and including) `logical_target`,
    /// following tape marks forward from wherever the cache left off.
    fn extend_to(&mut self, logical_target: u64) -> Result<(), Fault> {
        loop {
            let (logical_end, physical_next) = match self.segments.last() {
                Some(s) => (s.logical_start + s.length, s.physical_start + s.length),
                None => (0, 0),
            };
            if logical_end > logical_target {
                return Ok(());
            }
            if let Some(known_len) = self.logical_len_known {
                if logical_end >= known_len {
                    return Ok(());
                }
            }
            let (ty, _prev, next) = match read_mark(&mut self.inner, physical_next) {
                Ok(m) => m,
                Err(_) => {
                    self.logical_len_known = Some(logical_end);
                    return Ok(());
                }
            };
            if ty == 1 && next == 0 {
                // Tape mark with no following data: end of stream.
                self.logical_len_known = Some(logical_end);
                return Ok(());
            }
            self.segments.push(Segment {
                logical_start: logical_end,
                physical_start: physical_next + 12,
                length: next as u64,
            });
        }
    }

    fn locate(&mut self, logical: u64) -> Result<Option<Segment>, Fault> {
        self.extend_to(logical)?;
        Ok(self
            .segments
            .iter()
            .find(|s| logical >= s.logical_start && logical < s.logical_start + s.length)
            .copied())
    }
}

impl<S: ByteSource> ByteSource for TifSource<S> {
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
            self.inner.seek(seg.physical_start + offset_in_seg)?;
            let chunk = self.inner.read_exact_or_eof(take as usize)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ByteSource;

    struct MemSource {
        buf: Vec<u8>,
        pos: usize,
    }

    impl ByteSource for MemSource {
        fn seek(&mut self, abs: u64) -> Result<(), Fault> {
            self.pos = abs as usize;
            Ok(())
        }
        fn read(&mut self, n: usize) -> Result<Vec<u8>, Fault> {
            let end = (self.pos + n).min(self.buf.len());
            let out = self.buf[self.pos..end].to_vec();
            self.pos = end;
            Ok(out)
        }
        fn ptell(&mut self) -> Result<u64, Fault> {
            Ok(self.pos as u64)
        }
        fn eof(&mut self) -> Result<bool, Fault> {
            Ok(self.pos >= self.buf.len())
        }
    }

    fn mark(ty: u32, prev: u32, next: u32) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend(ty.to_le_bytes());
        v.extend(prev.to_le_bytes());
        v.extend(next.to_le_bytes());
        v
    }

    fn build_tif(chunks: &[&[u8]]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut prev = 0u32;
        for chunk in chunks {
            buf.extend(mark(0, prev, chunk.len() as u32));
            buf.extend(*chunk);
            prev = chunk.len() as u32;
        }
        buf.extend(mark(1, prev, 0));
        buf
    }

    #[test]
    fn probe_detects_consistent_marks() {
        let data = build_tif(&[b"hello world!", b"more data here"]);
        let mut mem = MemSource { buf: data, pos: 0 };
        assert!(TifSource::probe(&mut mem).unwrap());
    }

    #[test]
    fn probe_rejects_non_tif_content() {
        let mut mem = MemSource {
            buf: b"not a tif stream at all, just text".to_vec(),
            pos: 0,
        };
        assert!(!TifSource::probe(&mut mem).unwrap());
    }

    #[test]
    fn strips_marks_transparently() {
        let data = build_tif(&[b"hello world!", b"more data here"]);
        let mem = MemSource { buf: data, pos: 0 };
        let mut tif = TifSource::new(mem);
        let out = tif.read(26).unwrap();
        assert_eq!(out, b"hello world!more data here");
    }

    #[test]
    fn seek_then_read_crosses_segment_boundary() {
        let data = build_tif(&[b"hello world!", b"more data here"]);
        let mem = MemSource { buf: data, pos: 0 };
        let mut tif = TifSource::new(mem);
        tif.seek(8).unwrap();
        let out = tif.read(10).unwrap();
        assert_eq!(out, b"rld!more d");
    }
}
