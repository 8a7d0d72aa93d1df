// Typed front-ends over pooled objects (spec §4.4, §9 "Registered type
// table" / "Lazy references"). Each view is a thin projection over an
// `Object`'s attic; references are kept as plain obnames and resolved
// against the pool on access rather than stored as pointers, so forward
// references within a logical file and the Channel/Frame cycle never need
// an owning reference (spec §9 "Cyclic object graphs").

use crate::codec::{Repcode, Value};
use crate::objects::pool::{Object, Pool};
use crate::util::fingerprint::Obname;

fn first<'a>(object: &'a Object, label: &str) -> Option<&'a Value> {
    object.attribute(label).and_then(|v| v.first())
}

fn as_string(object: &Object, label: &str) -> Option<String> {
    match first(object, label)? {
        Value::Ident(s) | Value::Ascii(s) | Value::Units(s) => Some(s.clone()),
        _ => None,
    }
}

fn as_obname(value: &Value) -> Option<Obname> {
    match value {
        Value::Obname(ob) => Some(ob.clone()),
        Value::Objref(_, ob) | Value::Attref(_, ob, _) => Some(ob.clone()),
        _ => None,
    }
}

fn obname_list(object: &Object, label: &str) -> Vec<Obname> {
    object
        .attribute(label)
        .map(|vs| vs.iter().filter_map(as_obname).collect())
        .unwrap_or_default()
}

/// Unresolved reference to another object, kept as a fingerprint-forming
/// key rather than a pointer; resolution is a pool lookup the caller drives
/// explicitly (spec §9 "Lazy references").
#[derive(Debug, Clone)]
pub struct ObjectRef {
    pub type_tag: String,
    pub obname: Obname,
}

impl ObjectRef {
    pub fn resolve<'p>(&self, pool: &'p Pool) -> Option<&'p Object> {
        pool.resolve(&self.type_tag, &self.obname)
    }
}

pub struct ChannelView<'a>(pub &'a Object);

impl<'a> ChannelView<'a> {
    pub fn name(&self) -> &Obname {
        &self.0.obname
    }

    pub fn repcode(&self) -> Option<Repcode> {
        match first(self.0, "REPRESENTATION-CODE")? {
            Value::UShort(n) => Repcode::from_code(*n as u32),
            Value::Uvari(n) | Value::ULong(n) => Repcode::from_code(*n),
            _ => None,
        }
    }

    /// Element shape; empty means scalar (element count 1).
    pub fn dimension(&self) -> Vec<u32> {
        self.0
            .attribute("DIMENSION")
            .map(|vs| {
                vs.iter()
                    .filter_map(|v| v.as_f64())
                    .map(|f| f as u32)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn element_count(&self) -> u32 {
        let dims = self.dimension();
        if dims.is_empty() {
            1
        } else {
            dims.iter().product()
        }
    }

    pub fn units(&self) -> Option<String> {
        as_string(self.0, "UNITS")
    }

    pub fn long_name(&self) -> Option<ObjectRef> {
        first(self.0, "LONG-NAME").and_then(as_obname).map(|ob| ObjectRef {
            type_tag: "LONG-NAME".to_string(),
            obname: ob,
        })
    }
}

pub struct FrameView<'a>(pub &'a Object);

impl<'a> FrameView<'a> {
    pub fn name(&self) -> &Obname {
        &self.0.obname
    }

    pub fn index_type(&self) -> Option<String> {
        as_string(self.0, "INDEX-TYPE")
    }

    pub fn direction(&self) -> Option<String> {
        as_string(self.0, "DIRECTION")
    }

    pub fn spacing(&self) -> Option<f64> {
        first(self.0, "SPACING").and_then(Value::as_f64)
    }

    pub fn channel_refs(&self) -> Vec<ObjectRef> {
        obname_list(self.0, "CHANNELS")
            .into_iter()
            .map(|obname| ObjectRef {
                type_tag: "CHANNEL".to_string(),
                obname,
            })
            .collect()
    }

    /// Resolves every channel reference, dropping (and letting the caller
    /// log via `escape` beforehand) any that do not resolve.
    pub fn channels<'p>(&self, pool: &'p Pool) -> Vec<ChannelView<'p>> {
        self.channel_refs()
            .iter()
            .filter_map(|r| r.resolve(pool))
            .map(ChannelView)
            .collect()
    }
}

pub struct OriginView<'a>(pub &'a Object);

impl<'a> OriginView<'a> {
    pub fn name(&self) -> &Obname {
        &self.0.obname
    }

    pub fn company(&self) -> Option<String> {
        as_string(self.0, "COMPANY")
    }

    pub fn well_name(&self) -> Option<String> {
        as_string(self.0, "WELL-NAME")
    }

    pub fn creation_time(&self) -> Option<&Value> {
        first(self.0, "CREATION-TIME")
    }
}

pub struct ParameterView<'a>(pub &'a Object);

impl<'a> ParameterView<'a> {
    pub fn name(&self) -> &Obname {
        &self.0.obname
    }

    pub fn values(&self) -> Option<&Vec<Value>> {
        self.0.attribute("VALUES")
    }
}

pub struct ToolView<'a>(pub &'a Object);

impl<'a> ToolView<'a> {
    pub fn name(&self) -> &Obname {
        &self.0.obname
    }

    pub fn description(&self) -> Option<String> {
        as_string(self.0, "DESCRIPTION")
    }
}

/// Passthrough view for a type tag the loader has no built-in front-end
/// for (spec §9 "Registered type table": `extra_kinds` maps a set-type
/// string onto this, or a caller-supplied tag of its own).
pub struct UnknownView<'a>(pub &'a Object);

impl<'a> UnknownView<'a> {
    pub fn type_tag(&self) -> &str {
        &self.0.type_tag
    }

    pub fn name(&self) -> &Obname {
        &self.0.obname
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::pool::Pool;
    use crate::objects::set::ObjectRecord;

    fn record(id: &str, attrs: Vec<(&str, Option<Vec<Value>>)>) -> ObjectRecord {
        ObjectRecord {
            obname: Obname::new(1, 0, id),
            attributes: attrs.into_iter().map(|(l, v)| (l.to_string(), v)).collect(),
        }
    }

    #[test]
    fn channel_view_reads_repcode_and_dimension() {
        let mut pool = Pool::new();
        pool.insert(
            "CHANNEL",
            record(
                "DEPT",
                vec![
                    ("REPRESENTATION-CODE", Some(vec![Value::UShort(2)])),
                    ("DIMENSION", Some(vec![Value::Uvari(1)])),
                    ("UNITS", Some(vec![Value::Units("M".into())])),
                ],
            ),
        );
        let obj = pool.object("CHANNEL", "DEPT", Some(1), Some(0)).unwrap().unwrap();
        let view = ChannelView(obj);
        assert_eq!(view.repcode(), Some(Repcode::FSingl));
        assert_eq!(view.element_count(), 1);
        assert_eq!(view.units(), Some("M".into()));
    }

    #[test]
    fn frame_view_resolves_channels_through_pool() {
        let mut pool = Pool::new();
        pool.insert("CHANNEL", record("DEPT", vec![]));
        pool.insert("CHANNEL", record("GR", vec![]));
        let frame_channels = vec![
            Value::Obname(Obname::new(1, 0, "DEPT")),
            Value::Obname(Obname::new(1, 0, "GR")),
        ];
        pool.insert("FRAME", record("MAIN", vec![("CHANNELS", Some(frame_channels))]));
        let frame_obj = pool.object("FRAME", "MAIN", Some(1), Some(0)).unwrap().unwrap();
        let frame = FrameView(frame_obj);
        let resolved = frame.channels(&pool);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn dangling_channel_reference_is_dropped_not_panicked() {
        let mut pool = Pool::new();
        let refs = vec![Value::Obname(Obname::new(1, 0, "MISSING"))];
        pool.insert("FRAME", record("MAIN", vec![("CHANNELS", Some(refs))]));
        let frame_obj = pool.object("FRAME", "MAIN", Some(1), Some(0)).unwrap().unwrap();
        let frame = FrameView(frame_obj);
        assert!(frame.channels(&pool).is_empty());
    }
}
