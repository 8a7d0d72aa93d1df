// Record assembler (spec §4.2, §4.8): walks logical record segments,
// concatenates same-record payloads, and classifies each assembled record
// as explicit (EFLR) or implicit (IFLR/FDATA).

use crate::escape::Escape;
use crate::source::ByteSource;
use crate::util::status::{Fault, FaultKind, Severity};

const LRSH_LENGTH: usize = 4;

#[derive(Debug, Clone, Copy)]
struct LrsHeader {
    length: u16,
    is_explicit: bool,
    has_predecessor: bool,
    has_successor: bool,
    has_padding: bool,
    has_trailing_length: bool,
    has_checksum: bool,
    has_encryption: bool,
    record_type: u8,
}

fn parse_header(bytes: &[u8]) -> LrsHeader {
    let length = u16::from_be_bytes([bytes[0], bytes[1]]);
    let attrs = bytes[2];
    let record_type = bytes[3];
    LrsHeader {
        length,
        is_explicit: attrs & 0x80 != 0,
        has_predecessor: attrs & 0x40 != 0,
        has_successor: attrs & 0x20 != 0,
        has_encryption: attrs & 0x10 != 0 || attrs & 0x08 != 0,
        has_checksum: attrs & 0x04 != 0,
        has_trailing_length: attrs & 0x02 != 0,
        has_padding: attrs & 0x01 != 0,
        record_type,
    }
}

fn trim_trailing(mut payload: Vec<u8>, h: &LrsHeader) -> Result<Vec<u8>, Fault> {
    let bad_trim = || Fault::new(FaultKind::BadSegmentTrim, Some("bad segment trim"));
    if h.has_trailing_length {
        if payload.len() < 2 {
            return Err(bad_trim());
        }
        payload.truncate(payload.len() - 2);
    }
    if h.has_checksum {
        if payload.len() < 2 {
            return Err(bad_trim());
        }
        payload.truncate(payload.len() - 2);
    }
    if h.has_padding {
        let pad = match payload.last() {
            Some(&b) => b as usize,
            None => return Err(bad_trim()),
        };
        if pad == 0 || pad > payload.len() {
            return Err(bad_trim());
        }
        payload.truncate(payload.len() - pad);
    }
    Ok(payload)
}

/// One fully assembled logical record's location, independent of whether
/// its payload has been materialised yet (spec §4.2's two parallel
/// streams: explicit descriptors carry enough to materialise on demand;
/// implicit descriptors are only ever peeked through by the FDATA index).
#[derive(Debug, Clone, Copy)]
pub struct RecordDescriptor {
    pub record_type: u8,
    pub is_explicit: bool,
    pub tell: u64,
    pub length: u64,
}

enum State {
    Idle,
    Collecting {
        tell: u64,
        record_type: u8,
        is_explicit: bool,
        length: u64,
    },
}

/// Walks every logical record segment in `source` from its current
/// position to EOF, returning the ordered record descriptors discovered
/// and every fault encountered along the way (already passed through
/// `escape` so severities at or above threshold also appear as `Err`
/// values the caller can choose to stop on).
pub fn scan(
    source: &mut dyn ByteSource,
    escape: &Escape,
) -> (Vec<RecordDescriptor>, Vec<Fault>) {
    let mut descriptors = Vec::new();
    let mut faults = Vec::new();
    let mut state = State::Idle;

    loop {
        let tell_before = match source.ptell() {
            Ok(t) => t,
            Err(_) => break,
        };
        let header_bytes = match source.read(LRSH_LENGTH) {
            Ok(b) => b,
            Err(_) => break,
        };
        if header_bytes.len() < LRSH_LENGTH {
            if matches!(state, State::Collecting { .. }) {
                let f = Fault::new(FaultKind::Truncated, Some("unexpected EOF when reading record"));
                let _ = escape.check(f.clone());
                faults.push(f);
            }
            break;
        }

        let header = parse_header(&header_bytes);

        if header.length < LRSH_LENGTH as u16 {
            let f = Fault::new(FaultKind::ShortLogicalRecord, Some("Too short logical record"));
            let stop = escape.check(f.clone()).is_err();
            faults.push(f);
            if stop {
                break;
            }
            continue;
        }

        if header.has_encryption {
            let f = Fault::new(FaultKind::Truncated, Some("encrypted logical records are unsupported"))
                .with_severity(Severity::Critical);
            faults.push(f.clone());
            let _ = escape.check(f);
            break;
        }

        let body_len = header.length as usize - LRSH_LENGTH;
        let raw = match source.read(body_len) {
            Ok(b) => b,
            Err(_) => {
                let f = Fault::new(FaultKind::Truncated, Some("file truncated"));
                let _ = escape.check(f.clone());
                faults.push(f);
                break;
            }
        };
        if raw.len() < body_len {
            let f = Fault::new(FaultKind::Truncated, Some("file truncated"));
            let _ = escape.check(f.clone());
            faults.push(f);
            break;
        }

        let trimmed = match trim_trailing(raw, &header) {
            Ok(t) => t,
            Err(f) => {
                let stop = escape.check(f.clone()).is_err();
                faults.push(f);
                state = State::Idle;
                if stop {
                    break;
                }
                continue;
            }
        };

        if !header.has_predecessor {
            if let State::Collecting { .. } = state {
                let f = Fault::new(FaultKind::OrphanContinuation, Some("orphan continuation"));
                let stop = escape.check(f.clone()).is_err();
                faults.push(f);
                if stop {
                    break;
                }
            }
            state = State::Collecting {
                tell: tell_before,
                record_type: header.record_type,
                is_explicit: header.is_explicit,
                length: 0,
            };
        } else if matches!(state, State::Idle) {
            let f = Fault::new(
                FaultKind::OrphanContinuation,
                Some("logical record segment chain is inconsistent"),
            );
            let stop = escape.check(f.clone()).is_err();
            faults.push(f);
            if stop {
                break;
            }
            continue;
        }

        if let State::Collecting { length, .. } = &mut state {
            *length += trimmed.len() as u64;
        }

        if !header.has_successor {
            if let State::Collecting {
                tell,
                record_type,
                is_explicit,
                length,
            } = state
            {
                descriptors.push(RecordDescriptor {
                    record_type,
                    is_explicit,
                    tell,
                    length,
                });
            }
            state = State::Idle;
        }
    }

    if matches!(state, State::Collecting { .. }) {
        let f = Fault::new(
            FaultKind::Truncated,
            Some("last logical record segment expects successor"),
        );
        let _ = escape.check(f.clone());
        faults.push(f);
    }

    (descriptors, faults)
}

/// Materialises the full payload of the record described by `desc` by
/// seeking to its tell and re-walking its segment chain. Used on demand by
/// the object-set parser and by the FDATA peek/decode paths; never cached
/// by the assembler itself (spec: "payload materialised on demand").
pub fn read_payload(source: &mut dyn ByteSource, desc: &RecordDescriptor) -> Result<Vec<u8>, Fault> {
    source.seek(desc.tell)?;
    let mut payload = Vec::with_capacity(desc.length as usize);
    loop {
        let header_bytes = source.read_exact_or_eof(LRSH_LENGTH)?;
        let header = parse_header(&header_bytes);
        let body_len = header.length as usize - LRSH_LENGTH;
        let raw = source.read_exact_or_eof(body_len)?;
        let trimmed = trim_trailing(raw, &header)?;
        payload.extend(trimmed);
        if !header.has_successor {
            break;
        }
    }
    Ok(payload)
}

/// Peeks only the first `n` bytes of a record's *first segment* payload,
/// without reassembling the full multi-segment record. Used by the FDATA
/// index to read just the `obname + frameno` prefix of an implicit record
/// cheaply (spec §4.6).
pub fn peek_first_segment(
    source: &mut dyn ByteSource,
    desc: &RecordDescriptor,
    n: usize,
) -> Result<Vec<u8>, Fault> {
    source.seek(desc.tell)?;
    let header_bytes = source.read_exact_or_eof(LRSH_LENGTH)?;
    let header = parse_header(&header_bytes);
    let body_len = header.length as usize - LRSH_LENGTH;
    let raw = source.read_exact_or_eof(body_len.min(n))?;
    Ok(raw)
}
