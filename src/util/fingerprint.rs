// Obname, fingerprint and the type-tag keying the object pool (spec §3).

use std::fmt;

/// RP66 set-type string, e.g. `"CHANNEL"`, `"FRAME"`, or any vendor-defined
/// identifier the loader does not recognise. Kept as an owned string rather
/// than a closed enum so an `Unknown` set type round-trips through the pool
/// without losing its original spelling (spec §9, "Registered type table").
pub type TypeTag = String;

/// Three-part RP66 object identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Obname {
    pub origin: u32,
    pub copy: u32,
    pub identifier: String,
}

impl Obname {
    pub fn new(origin: u32, copy: u32, identifier: impl Into<String>) -> Self {
        Self {
            origin,
            copy,
            identifier: identifier.into(),
        }
    }

    /// Builds the canonical fingerprint for this obname under `type_tag`.
    pub fn fingerprint(&self, type_tag: &str) -> Fingerprint {
        Fingerprint(format!(
            "T.{}-I.{}-O.{}-C.{}",
            type_tag, self.identifier, self.origin, self.copy
        ))
    }
}

impl fmt::Display for Obname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(O={},C={})", self.identifier, self.origin, self.copy)
    }
}

/// Canonical string primary key for an object within one logical file:
/// `T.<type>-I.<identifier>-O.<origin>-C.<copy>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
