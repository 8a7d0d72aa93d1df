// Per-logical-file random-access index (spec §4.6): peeks just the
// `obname + frameno` prefix of every implicit record so a frame's rows can
// be located without ever materialising a payload the caller didn't ask
// for.

use std::collections::HashMap;

use crate::codec::{self, Repcode, Value};
use crate::escape::Escape;
use crate::record::{self, RecordDescriptor};
use crate::source::ByteSource;
use crate::util::cursor::Cursor;
use crate::util::fingerprint::Fingerprint;
use crate::util::status::{Fault, FaultKind};

/// One implicit (FDATA) record's location plus the frame number peeked out
/// of its header, in the order the assembler encountered it.
#[derive(Debug, Clone, Copy)]
pub struct FdataEntry {
    pub tell: u64,
    pub length: u64,
    pub frame_number: u32,
}

impl FdataEntry {
    pub fn descriptor(&self) -> RecordDescriptor {
        RecordDescriptor {
            record_type: 0,
            is_explicit: false,
            tell: self.tell,
            length: self.length,
        }
    }
}

#[derive(Default)]
pub struct Index {
    pub explicit: Vec<RecordDescriptor>,
    by_frame: HashMap<Fingerprint, Vec<FdataEntry>>,
}

impl Index {
    pub fn entries_for(&self, frame_fingerprint: &Fingerprint) -> &[FdataEntry] {
        self.by_frame
            .get(frame_fingerprint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

const PEEK_BUDGET: usize = 32;

fn peek_obname_and_frameno(
    source: &mut dyn ByteSource,
    desc: &RecordDescriptor,
) -> Result<(Fingerprint, u32), Fault> {
    let want = PEEK_BUDGET.min(desc.length as usize);
    let raw = record::peek_first_segment(source, desc, want)?;
    let mut cursor = Cursor::new(&raw);
    let obname = match codec::decode(Repcode::Obname, &mut cursor)? {
        Value::Obname(ob) => ob,
        _ => unreachable!(),
    };
    let frame_number = match codec::decode(Repcode::Uvari, &mut cursor)? {
        Value::Uvari(n) => n,
        _ => unreachable!(),
    };
    Ok((obname.fingerprint("FRAME"), frame_number))
}

/// Builds the index from a flat, already-assembled descriptor stream
/// (spec §4.2's two parallel streams, here recombined into one ordered
/// walk so explicit/implicit interleaving in the physical file is
/// preserved for `explicit`).
pub fn build(
    source: &mut dyn ByteSource,
    descriptors: &[RecordDescriptor],
    escape: &Escape,
) -> (Index, Vec<Fault>) {
    let mut index = Index::default();
    let mut faults = Vec::new();

    for desc in descriptors {
        if desc.is_explicit {
            index.explicit.push(*desc);
            continue;
        }
        match peek_obname_and_frameno(source, desc) {
            Ok((fingerprint, frame_number)) => {
                index.by_frame.entry(fingerprint).or_default().push(FdataEntry {
                    tell: desc.tell,
                    length: desc.length,
                    frame_number,
                });
            }
            Err(f) => {
                let wrapped = Fault::new(
                    FaultKind::FrameFmtOverrun,
                    Some(format!("could not peek frame header: {}", f.description())),
                );
                let _ = escape.check(wrapped.clone());
                faults.push(wrapped);
            }
        }
    }

    (index, faults)
}
