//! Picks the policy for a request context and renders its headers.
//!
//! Header emission is best-effort hardening: nothing in here returns an error
//! or panics. Problems go to the diagnostics sink and the caller gets a
//! possibly empty header set.

use std::sync::Arc;

use log::debug;

use crate::context::RequestContext;
use crate::diagnostics::DiagnosticSink;
use crate::error::PolicyError;
use crate::serializer::{render, RenderedHeaders};
use crate::snapshot::PolicySnapshot;
use crate::validator::validate;

/// Resolves headers for a context id such as `"frontend"`.
///
/// An unknown id reports [`PolicyError::UnknownContext`]; a known context
/// without a stored record reports [`PolicyError::MissingStoredRecord`]. Both
/// yield no headers. Validation problems are reported but never block
/// rendering.
pub fn resolve(
    context_id: &str,
    snapshot: &PolicySnapshot,
    sink: &dyn DiagnosticSink,
) -> RenderedHeaders {
    match context_id.parse::<RequestContext>() {
        Ok(context) => resolve_context(context, snapshot, sink),
        Err(err) => {
            sink.report(None, &err);
            RenderedHeaders::new()
        }
    }
}

/// Same as [`resolve`] for an already classified context.
pub fn resolve_context(
    context: RequestContext,
    snapshot: &PolicySnapshot,
    sink: &dyn DiagnosticSink,
) -> RenderedHeaders {
    let model = match snapshot.get(context) {
        Some(model) => model,
        None => {
            sink.report(
                Some(context),
                &PolicyError::MissingStoredRecord {
                    context: context.to_string(),
                },
            );
            return RenderedHeaders::new();
        }
    };

    for result in validate(model) {
        if let Some(err) = result.error() {
            sink.report(Some(context), err);
        }
    }

    let headers = render(model);
    debug!("resolved {} header(s) for {}", headers.len(), context);
    headers
}

/// Holds the current snapshot and sink for a serving process.
///
/// Cloning is cheap, so each worker can keep its own handle.
#[derive(Clone)]
pub struct HeaderDispatcher {
    snapshot: Arc<PolicySnapshot>,
    sink: Arc<dyn DiagnosticSink>,
}

impl HeaderDispatcher {
    pub fn new(snapshot: PolicySnapshot, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            sink,
        }
    }

    /// Snapshot currently being served.
    pub fn snapshot(&self) -> &PolicySnapshot {
        &self.snapshot
    }

    /// A dispatcher for a freshly loaded snapshot, sharing the same sink.
    /// Handles to the old snapshot keep serving it until they are dropped.
    pub fn reload(&self, snapshot: PolicySnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            sink: Arc::clone(&self.sink),
        }
    }

    /// See [`resolve`].
    pub fn resolve(&self, context_id: &str) -> RenderedHeaders {
        resolve(context_id, &self.snapshot, self.sink.as_ref())
    }

    pub fn resolve_context(&self, context: RequestContext) -> RenderedHeaders {
        resolve_context(context, &self.snapshot, self.sink.as_ref())
    }
}

impl std::fmt::Debug for HeaderDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderDispatcher")
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}
