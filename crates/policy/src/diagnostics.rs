//! Where configuration problems go.
//!
//! The dispatcher never fails a request because of a bad policy; it reports
//! through a [`DiagnosticSink`] instead. [`LogSink`] writes to the `log`
//! facade, [`MemorySink`] keeps the records around for admin notices.

use std::sync::Arc;

use log::{error, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::{PolicyError, Severity};

/// Receives diagnostics produced while resolving headers.
pub trait DiagnosticSink: Send + Sync {
    /// `context` is `None` when the request context itself could not be
    /// identified.
    fn report(&self, context: Option<RequestContext>, diagnostic: &PolicyError);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn report(&self, context: Option<RequestContext>, diagnostic: &PolicyError) {
        (**self).report(context, diagnostic)
    }
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, context: Option<RequestContext>, diagnostic: &PolicyError) {
        let context = context.map_or("unknown", |c| c.as_str());
        match diagnostic.severity() {
            Severity::Warning => warn!("csp [{}]: {}", context, diagnostic),
            Severity::Error => error!("csp [{}]: {}", context, diagnostic),
        }
    }
}

/// A diagnostic together with the context it was raised for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// `None` when the context id itself was not recognised
    pub context: Option<RequestContext>,
    pub error: PolicyError,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        self.error.severity()
    }

    /// Flat form suitable for rendering an admin notice.
    pub fn notice(&self) -> Notice {
        Notice {
            context: self.context,
            severity: self.severity(),
            directive: self.error.directive().map(str::to_string),
            message: self.error.to_string(),
        }
    }
}

/// Serializable view of a [`Diagnostic`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Context the problem was found in, if known
    pub context: Option<RequestContext>,
    /// How loudly to surface it
    pub severity: Severity,
    /// Directive the problem is attributed to, if any
    pub directive: Option<String>,
    /// Human readable description
    pub message: String,
}

/// Collects diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out everything recorded so far.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.records.lock().clone()
    }

    /// Takes everything recorded so far, leaving the sink empty.
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Number of diagnostics currently held.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, context: Option<RequestContext>, diagnostic: &PolicyError) {
        self.records.lock().push(Diagnostic {
            context,
            error: diagnostic.clone(),
        });
    }
}
