// Integration-level behaviour (spec §4.12): multi-logical-file
// partitioning, escape-level interaction, and an end-to-end curve decode,
// built from hand-written byte fixtures rather than bundled golden files.

use dlis::codec::{self, Value};
use dlis::{load, load_with, Fault, LoadOptions, Obname, Severity};
use std::io::Write;

fn vr_wrap(payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend(((payload.len() + 4) as u16).to_be_bytes());
    v.extend(0xFF01u16.to_be_bytes());
    v.extend(payload);
    v
}

fn lrs(explicit: bool, record_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut attrs = 0u8;
    if explicit {
        attrs |= 0x80;
    }
    let mut v = Vec::new();
    v.extend(((payload.len() + 4) as u16).to_be_bytes());
    v.push(attrs);
    v.push(record_type);
    v.extend(payload);
    v
}

fn set_header(role: u8, set_type: &str) -> Vec<u8> {
    let mut v = Vec::new();
    v.push((role << 5) | 0x10);
    v.push(set_type.len() as u8);
    v.extend(set_type.bytes());
    v
}

fn template_slot(label: &str, repcode: u8) -> Vec<u8> {
    let mut v = Vec::new();
    v.push((4u8 << 5) | 0x10 | 0x04); // ROLE_ATTRIB, LABEL + REPR present
    v.push(label.len() as u8);
    v.extend(label.bytes());
    v.push(repcode);
    v
}

fn object_header(obname: &Obname) -> Vec<u8> {
    let mut v = Vec::new();
    v.push((3u8 << 5) | 0x10); // ROLE_OBJECT, NAME present
    codec::encode(&Value::Obname(obname.clone()), &mut v);
    v
}

fn attr_value(value: &Value) -> Vec<u8> {
    let mut v = Vec::new();
    v.push((4u8 << 5) | 0x01); // ROLE_ATTRIB, VALUE present only
    codec::encode(value, &mut v);
    v
}

fn fileheader_set() -> Vec<u8> {
    let mut payload = set_header(2, "FILE-HEADER");
    payload.extend(object_header(&Obname::new(0, 0, "0")));
    payload
}

fn tmp_path(label: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("dlis_integration_{}_{}_{}", label, std::process::id(), line!()));
    path
}

#[test]
fn two_file_headers_yield_two_logical_files() {
    let path = tmp_path("two_fh");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        let mut buf = Vec::new();
        buf.extend(vr_wrap(&lrs(true, 0, &fileheader_set())));
        buf.extend(vr_wrap(&lrs(true, 0, &fileheader_set())));
        f.write_all(&buf).unwrap();
    }

    let files = load(&path).unwrap();
    assert_eq!(files.len(), 2);
    for i in 0..files.len() {
        assert!(files.get(i).unwrap().fileheader().is_some());
    }
    std::fs::remove_file(&path).ok();
}

#[test]
fn end_to_end_curve_decode() {
    let path = tmp_path("curves");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        let mut buf = Vec::new();
        buf.extend(vr_wrap(&lrs(true, 0, &fileheader_set())));

        let mut channel_payload = set_header(2, "CHANNEL");
        channel_payload.extend(template_slot("REPRESENTATION-CODE", 2)); // FSINGL
        channel_payload.extend(object_header(&Obname::new(1, 0, "GR")));
        channel_payload.extend(attr_value(&Value::UShort(2)));
        buf.extend(vr_wrap(&lrs(true, 4, &channel_payload)));

        let mut frame_payload = set_header(2, "FRAME");
        frame_payload.extend(template_slot("CHANNELS", 23)); // OBNAME
        frame_payload.extend(object_header(&Obname::new(1, 0, "MAIN")));
        frame_payload.extend(attr_value(&Value::Obname(Obname::new(1, 0, "GR"))));
        buf.extend(vr_wrap(&lrs(true, 4, &frame_payload)));

        for (n, v) in [(1u32, 5.5f32), (2u32, 6.5f32)] {
            let mut row = Vec::new();
            codec::encode(&Value::Obname(Obname::new(1, 0, "MAIN")), &mut row);
            codec::encode(&Value::Uvari(n), &mut row);
            codec::encode(&Value::FSingl(v), &mut row);
            buf.extend(vr_wrap(&lrs(false, 0, &row)));
        }

        f.write_all(&buf).unwrap();
    }

    let mut files = load(&path).unwrap();
    assert_eq!(files.len(), 1);
    let file = files.get_mut(0).unwrap();

    let channel_count = file.channels().count();
    assert_eq!(channel_count, 1);

    let frame = file.frames().next().unwrap();
    let (table, faults) = file.curves(&frame).unwrap();
    assert!(faults.is_empty());
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column_count(), 1);
    assert_eq!(table.rows[0][0], vec![Value::FSingl(5.5)]);
    assert_eq!(table.rows[1][0], vec![Value::FSingl(6.5)]);

    std::fs::remove_file(&path).ok();
}

#[test]
fn replacement_set_behaviour_tracks_escape_level() {
    let build = || {
        let path = tmp_path("replacement");
        let mut f = std::fs::File::create(&path).unwrap();
        let mut buf = Vec::new();
        buf.extend(vr_wrap(&lrs(true, 0, &fileheader_set())));
        buf.extend(vr_wrap(&lrs(true, 4, &set_header(1, "CHANNEL")))); // ROLE_RSET = replacement
        f.write_all(&buf).unwrap();
        path
    };

    // At the default (warning) threshold the replacement set's fault
    // raises and is recorded; the set's (zero) objects never reach the pool.
    let path = build();
    let files = load(&path).unwrap();
    assert_eq!(files.len(), 1);
    assert!(files.get(0).unwrap().faults().iter().any(|f| f.description().contains("replacement")));
    std::fs::remove_file(&path).ok();

    // Widening the threshold to `error` recovers instead of raising.
    let path = build();
    let opts = LoadOptions {
        escape_level: Severity::Error,
        ..LoadOptions::default()
    };
    let files = load_with(&path, opts).unwrap();
    assert_eq!(files.len(), 1);
    std::fs::remove_file(&path).ok();
}

#[test]
fn unknown_escape_level_name_is_a_hard_error() {
    let err: Result<(), Fault> = dlis::set_escape_level("not-a-level");
    assert!(err.is_err());
}
