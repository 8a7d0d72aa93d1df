// EFLR object-set parser (spec §4.4).
//
// Every component (set header, template attribute, object header, object
// attribute) opens with a one-byte descriptor: the top three bits are a
// role, the bottom five are presence flags for that role's optional
// fields. Parsed the same way the teacher's footer magic-number check
// reads a fixed prefix before deciding how to interpret the rest of a
// block: classify first, then dispatch.

use std::collections::HashMap;

use crate::codec::{self, Repcode, Value};
use crate::escape::Escape;
use crate::util::cursor::Cursor;
use crate::util::fingerprint::Obname;
use crate::util::status::{Fault, FaultKind};

const ROLE_REDSET: u8 = 0;
const ROLE_RSET: u8 = 1;
const ROLE_SET: u8 = 2;
const ROLE_OBJECT: u8 = 3;
const ROLE_ATTRIB: u8 = 4;
const ROLE_INVATR: u8 = 5;
const ROLE_ABSATR: u8 = 6;

fn role_of(descriptor: u8) -> u8 {
    descriptor >> 5
}

fn flags_of(descriptor: u8) -> u8 {
    descriptor & 0x1F
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    Normal,
    Redundant,
    Replacement,
}

/// One template slot: the attribute shape every object in the set either
/// inherits verbatim or overrides in part (spec: "missing fields inherit
/// from the template slot at the same position").
#[derive(Debug, Clone)]
pub struct AttrDesc {
    pub label: String,
    pub count: u32,
    pub repcode: Repcode,
    pub units: Option<String>,
    pub default: Option<Vec<Value>>,
}

/// One parsed object: its identity plus the resolved attribute values in
/// template order. `None` means the object explicitly suppressed the
/// template default for that slot (spec: "a global default bit suppresses
/// the value entirely").
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub obname: Obname,
    pub attributes: Vec<(String, Option<Vec<Value>>)>,
}

impl ObjectRecord {
    pub fn attribute(&self, label: &str) -> Option<&Vec<Value>> {
        self.attributes
            .iter()
            .find(|(l, _)| l == label)
            .and_then(|(_, v)| v.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct ObjectSet {
    pub kind: SetKind,
    pub set_type: String,
    pub set_name: Option<String>,
    pub template: Vec<AttrDesc>,
    pub objects: Vec<ObjectRecord>,
}

fn read_ident(cursor: &mut Cursor) -> Result<String, Fault> {
    match codec::decode(Repcode::Ident, cursor)? {
        Value::Ident(s) => Ok(s),
        _ => unreachable!(),
    }
}

fn read_values(cursor: &mut Cursor, repcode: Repcode, count: u32) -> Result<Vec<Value>, Fault> {
    (0..count).map(|_| codec::decode(repcode, cursor)).collect()
}

fn parse_template_slot(descriptor: u8, cursor: &mut Cursor) -> Result<AttrDesc, Fault> {
    let flags = flags_of(descriptor);
    let label = if flags & 0x10 != 0 {
        read_ident(cursor)?
    } else {
        String::new()
    };
    let count = if flags & 0x08 != 0 {
        match codec::decode(Repcode::Uvari, cursor)? {
            Value::Uvari(v) => v,
            _ => unreachable!(),
        }
    } else {
        1
    };
    let repcode = if flags & 0x04 != 0 {
        let code = cursor.u8()? as u32;
        Repcode::from_code(code)
            .ok_or_else(|| Fault::new(FaultKind::UnknownRepcode, Some(format!("representation code {code} is unknown"))))?
    } else {
        Repcode::Ident
    };
    let units = if flags & 0x02 != 0 {
        Some(read_ident(cursor)?)
    } else {
        None
    };
    let default = if flags & 0x01 != 0 {
        Some(read_values(cursor, repcode, count)?)
    } else {
        None
    };
    Ok(AttrDesc {
        label,
        count,
        repcode,
        units,
        default,
    })
}

/// Applies one object-attribute component against its template slot,
/// producing the resolved value for that slot (spec: per-field inheritance
/// when a field is omitted from the override).
fn parse_object_attr(
    descriptor: u8,
    cursor: &mut Cursor,
    slot: &AttrDesc,
) -> Result<Option<Vec<Value>>, Fault> {
    if role_of(descriptor) == ROLE_ABSATR {
        return Ok(None);
    }
    let flags = flags_of(descriptor);
    let count = if flags & 0x08 != 0 {
        match codec::decode(Repcode::Uvari, cursor)? {
            Value::Uvari(v) => v,
            _ => unreachable!(),
        }
    } else {
        slot.count
    };
    let repcode = if flags & 0x04 != 0 {
        let code = cursor.u8()? as u32;
        Repcode::from_code(code)
            .ok_or_else(|| Fault::new(FaultKind::UnknownRepcode, Some(format!("representation code {code} is unknown"))))?
    } else {
        slot.repcode
    };
    if flags & 0x10 != 0 {
        let _ = read_ident(cursor)?; // label override: kept positional, not stored separately
    }
    if flags & 0x02 != 0 {
        let _ = read_ident(cursor)?; // units override
    }
    if flags & 0x01 != 0 {
        Ok(Some(read_values(cursor, repcode, count)?))
    } else {
        Ok(slot.default.clone())
    }
}

/// Parses one EFLR payload into a typed `ObjectSet`.
pub fn parse(payload: &[u8], escape: &Escape) -> Result<ObjectSet, Fault> {
    let mut cursor = Cursor::new(payload);

    let set_descriptor = cursor.u8()?;
    let role = role_of(set_descriptor);
    let kind = match role {
        ROLE_SET => SetKind::Normal,
        ROLE_REDSET => SetKind::Redundant,
        ROLE_RSET => SetKind::Replacement,
        _ => {
            return Err(Fault::new(
                FaultKind::UnsupportedSetKind,
                Some("unsupported set kind"),
            ))
        }
    };
    let flags = flags_of(set_descriptor);
    let set_type = if flags & 0x10 != 0 {
        read_ident(&mut cursor)?
    } else {
        return Err(Fault::new(
            FaultKind::UnsupportedSetKind,
            Some("unsupported set kind"),
        ));
    };
    let set_name = if flags & 0x08 != 0 {
        Some(read_ident(&mut cursor)?)
    } else {
        None
    };

    if kind != SetKind::Normal {
        let sev_label = match kind {
            SetKind::Replacement => "replacement set is not merged into the pool",
            SetKind::Redundant => "redundant set copy ignored",
            SetKind::Normal => unreachable!(),
        };
        escape.check(Fault::new(FaultKind::UnsupportedSetKind, Some(sev_label)))?;
    }

    let mut template = Vec::new();
    while !cursor.is_empty() {
        let descriptor = cursor.peek(1)?[0];
        if role_of(descriptor) == ROLE_OBJECT {
            break;
        }
        cursor.take(1)?;
        template.push(parse_template_slot(descriptor, &mut cursor)?);
    }

    let mut objects = Vec::new();
    'objects: while !cursor.is_empty() {
        let descriptor = cursor.take(1)?[0];
        if role_of(descriptor) != ROLE_OBJECT {
            escape.check(Fault::new(
                FaultKind::ParseInterrupted,
                Some("parse interrupted"),
            ))?;
            break;
        }
        let obj_flags = flags_of(descriptor);
        let obname = if obj_flags & 0x10 != 0 {
            match codec::decode(Repcode::Obname, &mut cursor) {
                Ok(Value::Obname(ob)) => ob,
                Ok(_) => unreachable!(),
                Err(f) => {
                    escape.check(f)?;
                    break 'objects;
                }
            }
        } else {
            escape.check(Fault::new(
                FaultKind::ParseInterrupted,
                Some("object component missing its name"),
            ))?;
            break;
        };

        let mut attributes = Vec::with_capacity(template.len());
        for slot in &template {
            if cursor.is_empty() {
                attributes.push((slot.label.clone(), slot.default.clone()));
                continue;
            }
            let peek = cursor.peek(1)?[0];
            if role_of(peek) == ROLE_OBJECT {
                attributes.push((slot.label.clone(), slot.default.clone()));
                continue;
            }
            let attr_descriptor = cursor.take(1)?[0];
            match parse_object_attr(attr_descriptor, &mut cursor, slot) {
                Ok(value) => attributes.push((slot.label.clone(), value)),
                Err(f) => {
                    escape.check(f)?;
                    for remaining in &template[attributes.len()..] {
                        attributes.push((remaining.label.clone(), remaining.default.clone()));
                    }
                    break;
                }
            }
        }
        objects.push(ObjectRecord { obname, attributes });
    }

    Ok(ObjectSet {
        kind,
        set_type,
        set_name,
        template,
        objects,
    })
}
