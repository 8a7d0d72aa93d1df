// Object pool (spec §4.5): the queryable graph one logical file's EFLRs
// parse into. Two indices over the same storage, same shape as the
// teacher's table cache keying one underlying store by two different
// lookup needs (exact handle vs iteration).

use std::collections::HashMap;

use regex::Regex;

use crate::codec::Value;
use crate::objects::set::ObjectRecord;
use crate::util::fingerprint::{Fingerprint, Obname, TypeTag};
use crate::util::status::{Fault, FaultKind};

/// One pooled object: its type, identity, and raw attribute map (the
/// "attic" — spec §3). Typed front-ends project named attributes out of
/// this rather than the pool storing per-kind structs itself.
#[derive(Debug, Clone)]
pub struct Object {
    pub type_tag: TypeTag,
    pub obname: Obname,
    pub fingerprint: Fingerprint,
    pub attic: HashMap<String, Option<Vec<Value>>>,
}

impl Object {
    pub fn attribute(&self, label: &str) -> Option<&Vec<Value>> {
        self.attic.get(label).and_then(|v| v.as_ref())
    }

    fn attic_bytes_equal(&self, other: &Object) -> bool {
        self.attic == other.attic
    }
}

/// A duplicate fingerprint whose attic diverged from the first copy seen
/// (spec §4.5 deduplication rule).
#[derive(Debug, Clone)]
pub struct Problematic {
    pub fingerprint: Fingerprint,
    pub original: Object,
    pub duplicate: Object,
}

#[derive(Default)]
pub struct Pool {
    by_fingerprint: HashMap<Fingerprint, Object>,
    by_type: HashMap<TypeTag, Vec<Fingerprint>>,
    problematic: Vec<Problematic>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parsed EFLR object record under `type_tag`, applying the
    /// deduplication rule: byte-identical duplicates are folded silently,
    /// divergent ones keep the latest and quarantine the prior into
    /// `problematic`.
    pub fn insert(&mut self, type_tag: &str, record: ObjectRecord) {
        let fingerprint = record.obname.fingerprint(type_tag);
        let attic = record.attributes.into_iter().collect();
        let object = Object {
            type_tag: type_tag.to_string(),
            obname: record.obname,
            fingerprint: fingerprint.clone(),
            attic,
        };

        if let Some(existing) = self.by_fingerprint.get(&fingerprint) {
            if existing.attic_bytes_equal(&object) {
                return;
            }
            self.problematic.push(Problematic {
                fingerprint: fingerprint.clone(),
                original: existing.clone(),
                duplicate: object.clone(),
            });
        } else {
            self.by_type
                .entry(type_tag.to_string())
                .or_default()
                .push(fingerprint.clone());
        }
        self.by_fingerprint.insert(fingerprint, object);
    }

    pub fn problematic(&self) -> &[Problematic] {
        &self.problematic
    }

    pub fn by_fingerprint_key(&self, fingerprint: &Fingerprint) -> Option<&Object> {
        self.by_fingerprint.get(fingerprint)
    }

    pub fn of_type(&self, type_tag: &str) -> impl Iterator<Item = &Object> {
        self.by_type
            .get(type_tag)
            .into_iter()
            .flatten()
            .filter_map(move |fp| self.by_fingerprint.get(fp))
    }

    pub fn all(&self) -> impl Iterator<Item = &Object> {
        self.by_fingerprint.values()
    }

    /// Exact lookup by `(type, name, origin?, copy?)`. When `origin`/`copy`
    /// are omitted, matches by `(type, identifier)` alone and fails with
    /// `DuplicateObject` when more than one candidate remains.
    pub fn object(
        &self,
        type_tag: &str,
        name: &str,
        origin: Option<u32>,
        copy: Option<u32>,
    ) -> Result<Option<&Object>, Fault> {
        if let (Some(o), Some(c)) = (origin, copy) {
            let fp = Obname::new(o, c, name).fingerprint(type_tag);
            return Ok(self.by_fingerprint.get(&fp));
        }
        let mut matches: Vec<&Object> = self
            .of_type(type_tag)
            .filter(|obj| obj.obname.identifier == name)
            .filter(|obj| origin.map_or(true, |o| obj.obname.origin == o))
            .filter(|obj| copy.map_or(true, |c| obj.obname.copy == c))
            .collect();
        if matches.len() > 1 {
            return Err(Fault::new(
                FaultKind::DuplicateObject,
                Some(format!("multiple matches for {type_tag}:{name}")),
            ));
        }
        Ok(matches.pop())
    }

    /// Case-insensitive regex match over type, then over each matching
    /// type's objects' identifiers (spec §4.5).
    pub fn matching<'a>(
        &'a self,
        pattern: &str,
        type_pattern: Option<&str>,
    ) -> Result<Vec<&'a Object>, Fault> {
        let name_re = build_regex(pattern)?;
        let type_re = type_pattern.map(build_regex).transpose()?;

        let mut out = Vec::new();
        for (type_tag, fingerprints) in &self.by_type {
            if let Some(re) = &type_re {
                if !re.is_match(type_tag) {
                    continue;
                }
            }
            for fp in fingerprints {
                if let Some(obj) = self.by_fingerprint.get(fp) {
                    if name_re.is_match(&obj.obname.identifier) {
                        out.push(obj);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Resolves a reference value (an `Obname` paired with the type the
    /// referring attribute declares it links to) against this pool. Absent
    /// targets log a warning through `escape` rather than raising, unless
    /// the escape threshold is set low enough to promote it.
    pub fn resolve(&self, target_type: &str, obname: &Obname) -> Option<&Object> {
        let fp = obname.fingerprint(target_type);
        self.by_fingerprint.get(&fp)
    }
}

fn build_regex(pattern: &str) -> Result<Regex, Fault> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Fault::new(FaultKind::ParseInterrupted, Some(format!("bad pattern '{pattern}': {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(origin: u32, copy: u32, id: &str, attrs: Vec<(&str, Option<Vec<Value>>)>) -> ObjectRecord {
        ObjectRecord {
            obname: Obname::new(origin, copy, id),
            attributes: attrs.into_iter().map(|(l, v)| (l.to_string(), v)).collect(),
        }
    }

    #[test]
    fn inserts_and_looks_up_by_exact_identity() {
        let mut pool = Pool::new();
        pool.insert("CHANNEL", record(1, 0, "DEPT", vec![("UNITS", Some(vec![Value::Ident("M".into())]))]));
        let obj = pool.object("CHANNEL", "DEPT", Some(1), Some(0)).unwrap().unwrap();
        assert_eq!(obj.attribute("UNITS"), Some(&vec![Value::Ident("M".into())]));
    }

    #[test]
    fn identical_duplicate_is_folded_silently() {
        let mut pool = Pool::new();
        pool.insert("CHANNEL", record(1, 0, "DEPT", vec![("UNITS", Some(vec![Value::Ident("M".into())]))]));
        pool.insert("CHANNEL", record(1, 0, "DEPT", vec![("UNITS", Some(vec![Value::Ident("M".into())]))]));
        assert_eq!(pool.problematic().len(), 0);
    }

    #[test]
    fn divergent_duplicate_is_quarantined_and_latest_wins() {
        let mut pool = Pool::new();
        pool.insert("CHANNEL", record(1, 0, "DEPT", vec![("UNITS", Some(vec![Value::Ident("M".into())]))]));
        pool.insert("CHANNEL", record(1, 0, "DEPT", vec![("UNITS", Some(vec![Value::Ident("FT".into())]))]));
        assert_eq!(pool.problematic().len(), 1);
        let obj = pool.object("CHANNEL", "DEPT", Some(1), Some(0)).unwrap().unwrap();
        assert_eq!(obj.attribute("UNITS"), Some(&vec![Value::Ident("FT".into())]));
    }

    #[test]
    fn ambiguous_lookup_without_origin_copy_errors() {
        let mut pool = Pool::new();
        pool.insert("CHANNEL", record(1, 0, "DEPT", vec![]));
        pool.insert("CHANNEL", record(2, 0, "DEPT", vec![]));
        let err = pool.object("CHANNEL", "DEPT", None, None).unwrap_err();
        assert_eq!(err.kind(), FaultKind::DuplicateObject);
    }

    #[test]
    fn regex_match_is_case_insensitive() {
        let mut pool = Pool::new();
        pool.insert("CHANNEL", record(1, 0, "DEPTH", vec![]));
        pool.insert("CHANNEL", record(1, 0, "GR", vec![]));
        let found = pool.matching("dep.*", Some("channel")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].obname.identifier, "DEPTH");
    }

    #[test]
    fn resolve_finds_target_by_declared_type() {
        let mut pool = Pool::new();
        pool.insert("CHANNEL", record(1, 0, "DEPT", vec![]));
        let target = Obname::new(1, 0, "DEPT");
        assert!(pool.resolve("CHANNEL", &target).is_some());
        assert!(pool.resolve("FRAME", &target).is_none());
    }
}
