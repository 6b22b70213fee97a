//! Catalogue of the CSP directives this engine knows how to configure.
//!
//! Declaration order is significant: the serializer emits clauses in exactly
//! this order, so two snapshots with the same content always render to the
//! same bytes.

use serde::Serialize;

/// Broad family a directive belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    /// Restricts where a resource class may be fetched from and takes part in
    /// the `default-src` fallback.
    Fetch,
    /// Governs properties of the document itself.
    Document,
    /// Governs where the document may navigate or be embedded.
    Navigation,
    /// Tells the browser where to send violation reports.
    Reporting,
}

/// Grammar the value of a directive must follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueSyntax {
    SourceList,
    /// `frame-ancestors` only takes schemes, hosts, `'self'`, `'none'` and `*`.
    AncestorSourceList,
    SandboxFlags,
    UriReferences,
    ReportingGroup,
}

/// A single known directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub id: &'static str,
    pub description: &'static str,
    pub kind: DirectiveKind,
    pub syntax: ValueSyntax,
}

impl Directive {
    const fn new(
        id: &'static str,
        description: &'static str,
        kind: DirectiveKind,
        syntax: ValueSyntax,
    ) -> Self {
        Self {
            id,
            description,
            kind,
            syntax,
        }
    }

    pub fn is_fetch(&self) -> bool {
        self.kind == DirectiveKind::Fetch
    }

    pub fn is_reporting(&self) -> bool {
        self.kind == DirectiveKind::Reporting
    }
}

use DirectiveKind::*;
use ValueSyntax::*;

/// A fetch directive taking a plain source list.
const fn fetch(id: &'static str, description: &'static str) -> Directive {
    Directive::new(id, description, Fetch, SourceList)
}

static DIRECTIVES: &[Directive] = &[
    fetch("default-src", "Fallback for unset fetch directives"),
    fetch("script-src", "Sources for JavaScript"),
    fetch("script-src-elem", "Sources for <script> elements"),
    fetch("script-src-attr", "Sources for inline event handlers"),
    fetch("style-src", "Sources for stylesheets"),
    fetch("style-src-elem", "Sources for <style> and <link> elements"),
    fetch("style-src-attr", "Sources for inline style attributes"),
    fetch("img-src", "Sources for images and favicons"),
    fetch("font-src", "Sources for fonts loaded with @font-face"),
    fetch("connect-src", "Targets for fetch, XHR and sockets"),
    fetch("media-src", "Sources for <audio>, <video> and <track>"),
    fetch("object-src", "Sources for <object> and <embed>"),
    fetch("frame-src", "Sources for nested browsing contexts"),
    fetch("child-src", "Sources for frames and workers"),
    fetch("worker-src", "Sources for worker scripts"),
    fetch("manifest-src", "Sources for application manifests"),
    Directive::new(
        "base-uri",
        "URLs allowed in the <base> element",
        Document,
        SourceList,
    ),
    Directive::new(
        "form-action",
        "Targets forms may submit to",
        Navigation,
        SourceList,
    ),
    Directive::new(
        "frame-ancestors",
        "Parents that may embed the page",
        Navigation,
        AncestorSourceList,
    ),
    Directive::new(
        "sandbox",
        "Sandbox flags applied to the page",
        Document,
        SandboxFlags,
    ),
    Directive::new(
        "report-uri",
        "Endpoints reports are POSTed to (deprecated)",
        Reporting,
        UriReferences,
    ),
    Directive::new(
        "report-to",
        "Reporting group defined by the Report-To header",
        Reporting,
        ReportingGroup,
    ),
];

/// All known directives in declaration order.
pub fn list_directives() -> &'static [Directive] {
    DIRECTIVES
}

/// Finds a directive by its exact, lowercase id.
pub fn lookup(id: &str) -> Option<&'static Directive> {
    DIRECTIVES.iter().find(|d| d.id == id)
}

/// Whether `id` names a directive in the catalogue.
pub fn is_known(id: &str) -> bool {
    lookup(id).is_some()
}

/// Whether `id` is a known fetch directive. Unknown ids are not.
pub fn is_fetch_directive(id: &str) -> bool {
    lookup(id).map_or(false, Directive::is_fetch)
}

pub fn is_reporting_directive(id: &str) -> bool {
    lookup(id).map_or(false, Directive::is_reporting)
}
