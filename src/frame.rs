// Frame decoder (spec §4.6): turns a frame's recorded FDATA tells into a
// row-major curve table, driven entirely by the channel schema the object
// layer already resolved.

use crate::codec::{self, Value};
use crate::escape::Escape;
use crate::index::FdataEntry;
use crate::objects::views::ChannelView;
use crate::record;
use crate::source::ByteSource;
use crate::util::cursor::Cursor;
use crate::util::status::{Fault, FaultKind};

/// One decoded frame: rows in the order their FDATA records were
/// encountered, each row holding one value-vector per channel (a channel
/// with `element_count() > 1` contributes more than one value per row).
#[derive(Debug, Clone)]
pub struct CurveTable {
    pub channel_names: Vec<String>,
    pub rows: Vec<Vec<Vec<Value>>>,
}

impl CurveTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.channel_names.len()
    }
}

/// Decodes every FDATA row belonging to a frame. Fails the whole frame
/// (spec: "a channel with an unknown repcode disables decode of the whole
/// frame") before touching any row if a channel's repcode can't be
/// resolved; otherwise decodes what it can and truncates at the first
/// unrecoverable overrun, returning the faults observed along the way.
pub fn curves(
    source: &mut dyn ByteSource,
    channels: &[ChannelView],
    entries: &[FdataEntry],
    escape: &Escape,
) -> Result<(CurveTable, Vec<Fault>), Fault> {
    let mut schema = Vec::with_capacity(channels.len());
    for ch in channels {
        let repcode = ch.repcode().ok_or_else(|| {
            Fault::new(
                FaultKind::UnknownRepcode,
                Some(format!(
                    "channel {} has an unrepresentable repcode",
                    ch.name()
                )),
            )
        })?;
        schema.push((repcode, ch.element_count()));
    }
    let channel_names: Vec<String> = channels.iter().map(|c| c.name().to_string()).collect();

    let mut faults = Vec::new();
    check_frame_number_policy(entries, escape, &mut faults);

    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let desc = entry.descriptor();
        let payload = record::read_payload(source, &desc)?;
        let mut cursor = Cursor::new(&payload);

        // Skip the obname + frameno prefix already peeked by the index.
        if codec::decode(crate::codec::Repcode::Obname, &mut cursor).is_err()
            || codec::decode(crate::codec::Repcode::Uvari, &mut cursor).is_err()
        {
            let f = Fault::new(FaultKind::FrameFmtOverrun, Some("fmtstr would read past end"));
            let _ = escape.check(f.clone());
            faults.push(f);
            break;
        }

        let mut row = Vec::with_capacity(schema.len());
        let mut overrun = false;
        for (repcode, count) in &schema {
            let mut values = Vec::with_capacity(*count as usize);
            let mut failed = false;
            for _ in 0..*count {
                match codec::decode(*repcode, &mut cursor) {
                    Ok(v) => values.push(v),
                    Err(_) => {
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                overrun = true;
                break;
            }
            row.push(values);
        }

        if overrun {
            let f = Fault::new(FaultKind::FrameFmtOverrun, Some("fmtstr would read past end"));
            let stop = escape.check(f.clone()).is_err();
            faults.push(f);
            if stop {
                break;
            }
            continue;
        }

        rows.push(row);
    }

    Ok((
        CurveTable {
            channel_names,
            rows,
        },
        faults,
    ))
}

/// Detects non-monotonic, missing, and duplicated frame numbers without
/// aborting decode (spec §4.6 step 4: logged, never fatal to the row set).
fn check_frame_number_policy(entries: &[FdataEntry], escape: &Escape, faults: &mut Vec<Fault>) {
    use std::collections::HashSet;
    let mut seen = HashSet::new();
    let mut last: Option<u32> = None;

    for entry in entries {
        let n = entry.frame_number;
        if seen.contains(&n) {
            let f = Fault::new(FaultKind::DuplicatedFrames, Some("Duplicated frames"));
            let _ = escape.check(f.clone());
            faults.push(f);
        } else if let Some(prev) = last {
            if n < prev {
                let f = Fault::new(FaultKind::NonSequentialFrames, Some("Non-sequential frames"));
                let _ = escape.check(f.clone());
                faults.push(f);
            } else if n > prev + 1 {
                let f = Fault::new(FaultKind::MissingFrames, Some("Missing frames"));
                let _ = escape.check(f.clone());
                faults.push(f);
            }
        }
        seen.insert(n);
        last = Some(last.map_or(n, |prev| prev.max(n)));
    }
}
