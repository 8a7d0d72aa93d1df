// Process-wide error escape threshold (spec §4.9).
//
// Modelled as explicit-init global state behind a `RwLock`, the same shape
// the storage engine this crate is adapted from uses for its process-wide
// logger configuration: a `lazy_static` cell guarding a small piece of
// mutable global state, read far more often than it is written.

use std::sync::RwLock;

use crate::util::status::{Fault, FaultKind, Severity};

lazy_static::lazy_static! {
    static ref ESCAPE_LEVEL: RwLock<Severity> = RwLock::new(Severity::Warning);
}

/// Sets the process-wide default escape level by name. Unknown names are a
/// hard error regardless of the current threshold (spec §4.9).
pub fn set_escape_level(name: &str) -> Result<(), Fault> {
    let level = Severity::parse(name).ok_or_else(|| {
        Fault::new(
            FaultKind::InvalidEscapeLevel,
            Some(format!("Invalid severity argument '{name}'")),
        )
    })?;
    *ESCAPE_LEVEL.write().expect("escape level lock poisoned") = level;
    Ok(())
}

/// Returns the current process-wide default escape level.
pub fn get_escape_level() -> Severity {
    *ESCAPE_LEVEL.read().expect("escape level lock poisoned")
}

/// A per-load escape context: decides whether a classified fault is logged
/// and recovered from, or raised to the caller. Threads a single comparison
/// through every parse site instead of re-reading global state at each one.
#[derive(Debug, Clone, Copy)]
pub struct Escape {
    threshold: Severity,
}

impl Escape {
    pub fn new(threshold: Severity) -> Self {
        Self { threshold }
    }

    pub fn from_global() -> Self {
        Self::new(get_escape_level())
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    /// Classifies `fault`: logs it at its own severity, then returns `Err`
    /// if its severity is at or above the threshold, `Ok(())` otherwise so
    /// the caller can continue with a documented fallback.
    pub fn check(&self, fault: Fault) -> Result<(), Fault> {
        log_fault(&fault);
        if fault.severity() >= self.threshold {
            Err(fault)
        } else {
            Ok(())
        }
    }
}

/// Emits `fault` through the `log` facade at the level matching its
/// severity, independent of whether it will also be raised (spec §4.11).
pub fn log_fault(fault: &Fault) {
    match fault.severity() {
        Severity::Debug => log::debug!("{}", fault.description()),
        Severity::Info => log::info!("{}", fault.description()),
        Severity::Warning => log::warn!("{}", fault.description()),
        Severity::Error => log::error!("{}", fault.description()),
        Severity::Critical => log::error!("{}", fault.description()),
    }
}
