// Fault classification shared by every layer of the core.
//
// Mirrors the split the storage engine this crate is adapted from uses for
// its own on-disk format errors: a closed set of reason codes (`FaultKind`)
// plus a free-text detail (`Fault`), rather than one variant per call site.

use std::fmt;

/// Totally ordered escape severity. Variant order is the ordering used by
/// `Severity::PartialOrd`/`Ord` — declare from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(name: &str) -> Option<Severity> {
        match name {
            "debug" => Some(Severity::Debug),
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed set of fault labels a parse site may raise. See spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Truncated,
    InvalidFormatVersion,
    BadSegmentTrim,
    ShortLogicalRecord,
    UnknownRepcode,
    DecodeRange,
    DanglingReference,
    DuplicateObject,
    UnsupportedSetKind,
    FrameFmtOverrun,
    NonSequentialFrames,
    MissingFrames,
    DuplicatedFrames,
    InvalidEscapeLevel,
    OrphanContinuation,
    ParseInterrupted,
    SegmentedFile,
    EnvelopeNotFound,
}

impl FaultKind {
    /// The severity a fault of this kind carries by default, absent any
    /// call-site override. Individual call sites may still pick a different
    /// severity when the same kind can occur at different blast radii.
    pub fn default_severity(self) -> Severity {
        use FaultKind::*;
        match self {
            Truncated => Severity::Error,
            InvalidFormatVersion => Severity::Error,
            BadSegmentTrim => Severity::Error,
            ShortLogicalRecord => Severity::Error,
            UnknownRepcode => Severity::Error,
            DecodeRange => Severity::Error,
            DanglingReference => Severity::Warning,
            DuplicateObject => Severity::Warning,
            UnsupportedSetKind => Severity::Warning,
            FrameFmtOverrun => Severity::Error,
            NonSequentialFrames => Severity::Warning,
            MissingFrames => Severity::Warning,
            DuplicatedFrames => Severity::Warning,
            InvalidEscapeLevel => Severity::Critical,
            OrphanContinuation => Severity::Warning,
            ParseInterrupted => Severity::Error,
            SegmentedFile => Severity::Warning,
            EnvelopeNotFound => Severity::Critical,
        }
    }
}

/// A classified defect: a kind, the severity it was raised at, and an
/// optional human-readable detail message.
#[derive(Debug, Clone)]
pub struct Fault {
    kind: FaultKind,
    severity: Severity,
    detail: Option<String>,
}

impl Fault {
    pub fn new(kind: FaultKind, detail: Option<impl Into<String>>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            detail: detail.map(Into::into),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn description(&self) -> String {
        match &self.detail {
            Some(d) => d.clone(),
            None => self.kind.label().to_string(),
        }
    }
}

impl FaultKind {
    /// Short stable label, matched by substring in log-scraping tests (§4.11).
    pub fn label(self) -> &'static str {
        use FaultKind::*;
        match self {
            Truncated => "file truncated",
            InvalidFormatVersion => "Incorrect format version",
            BadSegmentTrim => "bad segment trim",
            ShortLogicalRecord => "Too short logical record",
            UnknownRepcode => "representation code is unknown",
            DecodeRange => "value outside representable range",
            DanglingReference => "Referenced object not in logical file",
            DuplicateObject => "duplicate object",
            UnsupportedSetKind => "unsupported set kind",
            FrameFmtOverrun => "fmtstr would read past end",
            NonSequentialFrames => "Non-sequential frames",
            MissingFrames => "Missing frames",
            DuplicatedFrames => "Duplicated frames",
            InvalidEscapeLevel => "Invalid severity argument",
            OrphanContinuation => "orphan continuation",
            ParseInterrupted => "parse interrupted",
            SegmentedFile => "logical file might be segmented, data may be missing",
            EnvelopeNotFound => "could not find visible record envelope",
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.description())
    }
}

impl std::error::Error for Fault {}

pub type Result<T> = std::result::Result<T, Fault>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_least_to_most_severe() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn parse_rejects_unknown_name() {
        assert_eq!(Severity::parse("warning"), Some(Severity::Warning));
        assert_eq!(Severity::parse("invalid"), None);
    }

    #[test]
    fn fault_falls_back_to_kind_label() {
        let f = Fault::new(FaultKind::Truncated, None::<String>);
        assert_eq!(f.description(), "file truncated");
        assert_eq!(f.severity(), Severity::Error);
    }

    #[test]
    fn fault_detail_overrides_label() {
        let f = Fault::new(FaultKind::BadSegmentTrim, Some("trim past payload end"));
        assert_eq!(f.description(), "trim past payload end");
    }
}
