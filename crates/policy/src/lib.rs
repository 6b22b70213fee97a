//! SiteCSP policy crate
//!
//! Builds `Content-Security-Policy` headers for three audiences (admin
//! interface, logged-in users, anonymous visitors) from the records a
//! settings store keeps for each of them.
//!
//! The pipeline is: stored record -> [`PolicyModel`] -> [`validate`] (advisory)
//! and [`render`] -> [`RenderedHeaders`]. [`resolve`] ties the steps together
//! for a single request and never fails; problems are handed to a
//! [`DiagnosticSink`].

pub mod context;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod hash;
pub mod model;
pub mod registry;
pub mod serializer;
pub mod snapshot;
pub mod validator;

pub use context::RequestContext;
pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink, MemorySink, Notice};
pub use dispatcher::{resolve, resolve_context, HeaderDispatcher};
pub use error::{PolicyError, PolicyResult, Severity};
pub use hash::{hash_source, HashAlgorithm};
pub use model::{DirectiveEntry, PolicyMode, PolicyModel};
pub use registry::{Directive, DirectiveKind, ValueSyntax};
pub use serializer::{
    render, Header, RenderedHeaders, CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY_REPORT_ONLY,
    REPORT_TO,
};
pub use snapshot::{default_record, PolicySnapshot};
pub use validator::{validate, validate_value, SourceExpression, ValidationResult, ValidationStatus};
