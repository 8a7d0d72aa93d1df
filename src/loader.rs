// Loader / logical-file partitioner (spec §4.7).
//
// Opens the file once to classify its physical envelope (tape-image
// framing? where does the first visible record sit?), then reopens the
// byte-source stack once per logical file so each one's reads stay
// independent (spec §5: "acquired in the constructor, released
// deterministically on close").

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::escape::Escape;
use crate::frame::{self, CurveTable};
use crate::index::{self, Index};
use crate::objects::pool::{Object, Pool, Problematic};
use crate::objects::set;
use crate::objects::views::{ChannelView, FrameView, OriginView, ParameterView, ToolView, UnknownView};
use crate::record::{self, RecordDescriptor};
use crate::source::raw::RawFile;
use crate::source::tif::TifSource;
use crate::source::vrl::VrlSource;
use crate::source::{find_vr_offset, looks_like_sul, ByteSource, SUL_LENGTH, VR_SEARCH_WINDOW};
use crate::util::fingerprint::TypeTag;
use crate::util::status::{Fault, FaultKind, Severity};

const FILE_HEADER_TYPE: u8 = 0;

/// Per-load configuration (spec §4.12).
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub escape_level: Severity,
    pub extra_kinds: HashMap<String, TypeTag>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            escape_level: Severity::Warning,
            extra_kinds: HashMap::new(),
        }
    }
}

fn discover_first_vr_offset(inner: &mut dyn ByteSource) -> Result<u64, Fault> {
    inner.seek(0)?;
    let window = inner.read(VR_SEARCH_WINDOW)?;
    if window.len() >= SUL_LENGTH && looks_like_sul(&window[..SUL_LENGTH]) {
        if let Some(off) = find_vr_offset(&window[SUL_LENGTH..]) {
            return Ok((SUL_LENGTH + off) as u64);
        }
    }
    if let Some(off) = find_vr_offset(&window) {
        return Ok(off as u64);
    }
    Err(Fault::new(
        FaultKind::EnvelopeNotFound,
        Some("could not find visible record envelope"),
    ))
}

fn open_stack(path: &Path, is_tif: bool) -> Result<Box<dyn ByteSource>, Fault> {
    if is_tif {
        let raw = RawFile::open(path)?;
        let mut tif = TifSource::new(raw);
        let first_vr = discover_first_vr_offset(&mut tif)?;
        Ok(Box::new(VrlSource::new(tif, first_vr)))
    } else {
        let mut raw = RawFile::open(path)?;
        let first_vr = discover_first_vr_offset(&mut raw)?;
        Ok(Box::new(VrlSource::new(raw, first_vr)))
    }
}

struct Group {
    descriptors: Vec<RecordDescriptor>,
    segmented_warning: bool,
}

fn partition_by_fileheader(descriptors: &[RecordDescriptor]) -> Vec<Group> {
    let mut groups: Vec<Vec<RecordDescriptor>> = Vec::new();
    for d in descriptors {
        let is_pivot = d.is_explicit && d.record_type == FILE_HEADER_TYPE;
        if is_pivot || groups.is_empty() {
            groups.push(Vec::new());
        }
        groups.last_mut().unwrap().push(*d);
    }
    groups
        .into_iter()
        .enumerate()
        .map(|(i, descriptors)| {
            let segmented_warning = i == 0
                && !descriptors
                    .first()
                    .map(|d| d.is_explicit && d.record_type == FILE_HEADER_TYPE)
                    .unwrap_or(true);
            Group {
                descriptors,
                segmented_warning,
            }
        })
        .collect()
}

/// One self-contained logical file: its own object pool, FDATA index, and
/// byte source (spec §3 "Logical File").
pub struct LogicalFile {
    source: Box<dyn ByteSource>,
    pool: Pool,
    index: Index,
    faults: Vec<Fault>,
    escape: Escape,
    extra_kinds: HashMap<String, TypeTag>,
}

impl LogicalFile {
    pub fn fileheader(&self) -> Option<&Object> {
        self.pool.of_type("FILE-HEADER").next()
    }

    pub fn origins(&self) -> impl Iterator<Item = OriginView> {
        self.pool.of_type("ORIGIN").map(OriginView)
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelView> {
        self.pool.of_type("CHANNEL").map(ChannelView)
    }

    pub fn frames(&self) -> impl Iterator<Item = FrameView> {
        self.pool.of_type("FRAME").map(FrameView)
    }

    pub fn parameters(&self) -> impl Iterator<Item = ParameterView> {
        self.pool.of_type("PARAMETER").map(ParameterView)
    }

    pub fn tools(&self) -> impl Iterator<Item = ToolView> {
        self.pool.of_type("TOOL").map(ToolView)
    }

    const BUILTIN_TYPES: &'static [&'static str] = &[
        "FILE-HEADER",
        "ORIGIN",
        "CHANNEL",
        "FRAME",
        "PARAMETER",
        "TOOL",
    ];

    pub fn unknowns(&self) -> impl Iterator<Item = UnknownView> {
        let registered: Vec<&str> = self
            .extra_kinds
            .values()
            .map(String::as_str)
            .chain(Self::BUILTIN_TYPES.iter().copied())
            .collect();
        self.pool
            .all()
            .filter(move |obj| !registered.contains(&obj.type_tag.as_str()))
            .map(UnknownView)
    }

    pub fn of_extra_kind<'p>(&'p self, key: &str) -> impl Iterator<Item = UnknownView<'p>> {
        let type_tag = self.extra_kinds.get(key).cloned().unwrap_or_default();
        self.pool.of_type(&type_tag).map(UnknownView)
    }

    pub fn object(
        &self,
        type_tag: &str,
        name: &str,
        origin: Option<u32>,
        copy: Option<u32>,
    ) -> Result<Option<&Object>, Fault> {
        self.pool.object(type_tag, name, origin, copy)
    }

    pub fn matching(&self, pattern: &str, type_pattern: Option<&str>) -> Result<Vec<&Object>, Fault> {
        self.pool.matching(pattern, type_pattern)
    }

    pub fn problematic(&self) -> &[Problematic] {
        self.pool.problematic()
    }

    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    pub fn curves(&mut self, frame: &FrameView) -> Result<(CurveTable, Vec<Fault>), Fault> {
        let channels = frame.channels(&self.pool);
        let fingerprint = frame.name().fingerprint("FRAME");
        let entries = self.index.entries_for(&fingerprint).to_vec();
        frame::curves(&mut *self.source, &channels, &entries, &self.escape)
    }

    pub fn describe(&self, width: usize, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = String::new();
        out.push_str(&format!("{pad}logical file ({} objects)\n", self.pool.all().count()));
        for obj in self.pool.all() {
            let line = format!("{pad}  {} [{}]", obj.fingerprint, obj.type_tag);
            out.push_str(&wrap_line(&line, width));
            out.push('\n');
        }
        out
    }

    pub fn close(self) {}
}

fn wrap_line(line: &str, width: usize) -> String {
    if width == 0 || line.len() <= width {
        line.to_string()
    } else {
        format!("{}…", &line[..width.min(line.len())])
    }
}

pub struct LogicalFiles(Vec<LogicalFile>);

impl LogicalFiles {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogicalFile> {
        self.0.iter()
    }

    pub fn get(&self, i: usize) -> Option<&LogicalFile> {
        self.0.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut LogicalFile> {
        self.0.get_mut(i)
    }
}

impl std::ops::Index<usize> for LogicalFiles {
    type Output = LogicalFile;
    fn index(&self, i: usize) -> &LogicalFile {
        &self.0[i]
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<LogicalFiles, Fault> {
    load_with(path, LoadOptions::default())
}

pub fn load_with(path: impl AsRef<Path>, opts: LoadOptions) -> Result<LogicalFiles, Fault> {
    let path: PathBuf = path.as_ref().to_path_buf();
    let escape = Escape::new(opts.escape_level);

    let is_tif = {
        let mut probe = RawFile::open(&path)?;
        TifSource::probe(&mut probe)?
    };

    let mut scan_source = open_stack(&path, is_tif)?;
    let (descriptors, scan_faults) = record::scan(&mut *scan_source, &escape);

    let groups = partition_by_fileheader(&descriptors);
    let mut files = Vec::with_capacity(groups.len());

    for group in groups {
        let mut faults = Vec::new();
        if group.segmented_warning {
            let f = Fault::new(
                FaultKind::SegmentedFile,
                Some("logical file might be segmented, data may be missing"),
            );
            let _ = escape.check(f.clone());
            faults.push(f);
        }

        let mut lf_source = open_stack(&path, is_tif)?;
        let (index, index_faults) = index::build(&mut *lf_source, &group.descriptors, &escape);
        faults.extend(index_faults);

        let mut pool = Pool::new();
        for desc in &index.explicit {
            match record::read_payload(&mut *lf_source, desc) {
                Ok(payload) => match set::parse(&payload, &escape) {
                    Ok(object_set) => {
                        for obj in object_set.objects {
                            pool.insert(&object_set.set_type, obj);
                        }
                    }
                    Err(f) => faults.push(f),
                },
                Err(f) => faults.push(f),
            }
        }

        files.push(LogicalFile {
            source: lf_source,
            pool,
            index,
            faults,
            escape,
            extra_kinds: opts.extra_kinds.clone(),
        });
    }

    if files.is_empty() && !scan_faults.is_empty() {
        if let Some(fatal) = scan_faults.iter().find(|f| f.severity() >= escape.threshold()) {
            return Err(fatal.clone());
        }
    }

    Ok(LogicalFiles(files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, Value};
    use crate::util::fingerprint::Obname;
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

    fn fileheader_set() -> Vec<u8> {
        let mut payload = Vec::new();
        payload.push((2u8 << 5) | 0x10); // ROLE_SET, TYPE present
        payload.push(b"FILE-HEADER".len() as u8);
        payload.extend(b"FILE-HEADER");
        payload.push((3u8 << 5) | 0x10); // ROLE_OBJECT, NAME present
        codec::encode(&Value::Obname(Obname::new(0, 0, "0")), &mut payload);
        payload
    }

    #[test]
    fn loads_single_logical_file_with_fileheader() {
        let mut path = std::env::temp_dir();
        path.push(format!("dlis_loader_test_{}_{}", std::process::id(), line!()));
        {
            let mut f = std::fs::File::create(&path).unwrap();
            let record = lrs(true, 0, &fileheader_set());
            f.write_all(&vr_wrap(&record)).unwrap();
        }

        let files = load(&path).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].fileheader().is_some());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn two_fileheaders_yield_two_logical_files() {
        let mut path = std::env::temp_dir();
        path.push(format!("dlis_loader_test2_{}_{}", std::process::id(), line!()));
        {
            let mut f = std::fs::File::create(&path).unwrap();
            let mut buf = Vec::new();
            buf.extend(vr_wrap(&lrs(true, 0, &fileheader_set())));
            buf.extend(vr_wrap(&lrs(true, 0, &fileheader_set())));
            f.write_all(&buf).unwrap();
        }

        let files = load(&path).unwrap();
        assert_eq!(files.len(), 2);
        std::fs::remove_file(&path).ok();
    }
}
