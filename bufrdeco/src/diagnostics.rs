use serde::Serialize;
use std::fmt::Display;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}

pub const DEFAULT_CAPACITY: usize = 64;
pub const STACK_FULL: &str = "diagnostic stack full";

/// Bounded list of anomalies found while decoding one message.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    capacity: usize,
    full: bool,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        Diagnostics {
            entries: Vec::new(),
            capacity,
            full: false,
        }
    }

    /// Once `capacity` entries are held, one last marker is added and
    /// everything after it is dropped. Every entry still goes to the log.
    pub fn push<S: Into<String>>(&mut self, severity: Severity, message: S) {
        let message = message.into();
        match severity {
            Severity::Info => info!(target: "bufrdeco::diagnostics", "{}", message),
            Severity::Warning => warn!(target: "bufrdeco::diagnostics", "{}", message),
            Severity::Error => error!(target: "bufrdeco::diagnostics", "{}", message),
        }

        if self.full {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.push(Diagnostic {
                severity: Severity::Error,
                message: STACK_FULL.to_string(),
            });
            self.full = true;
            return;
        }

        self.entries.push(Diagnostic { severity, message });
    }

    pub fn info<S: Into<String>>(&mut self, message: S) {
        self.push(Severity::Info, message);
    }

    pub fn warning<S: Into<String>>(&mut self, message: S) {
        self.push(Severity::Warning, message);
    }

    pub fn error<S: Into<String>>(&mut self, message: S) {
        self.push(Severity::Error, message);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.full = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_adds_single_marker() {
        let mut d = Diagnostics::new(3);
        for i in 0..10 {
            d.warning(format!("entry {}", i));
        }

        assert!(d.is_full());
        assert_eq!(d.len(), 4);
        assert_eq!(d.entries()[2].message, "entry 2");
        assert_eq!(d.entries()[3].message, STACK_FULL);
        assert_eq!(d.entries()[3].severity, Severity::Error);

        d.clear();
        d.info("again");
        assert_eq!(d.len(), 1);
        assert!(!d.is_full());
    }

    #[test]
    fn display() {
        let mut d = Diagnostics::default();
        d.error("bad month");
        assert_eq!(d.entries()[0].to_string(), "[error] bad month");
    }
}
