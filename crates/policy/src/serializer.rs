//! Turns a [`PolicyModel`] into response headers.

use serde::Serialize;

use crate::model::{PolicyMode, PolicyModel};
use crate::registry;

pub const CONTENT_SECURITY_POLICY: &str = "Content-Security-Policy";
pub const CONTENT_SECURITY_POLICY_REPORT_ONLY: &str = "Content-Security-Policy-Report-Only";
pub const REPORT_TO: &str = "Report-To";

/// Separator between directive clauses.
const CLAUSE_SEPARATOR: &str = "; ";

/// A single response header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    /// Header name, in its canonical capitalisation
    pub name: String,
    /// Header value, free of control characters
    pub value: String,
}

/// Headers to attach verbatim to a response, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenderedHeaders {
    headers: Vec<Header>,
}

impl RenderedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, value: String) {
        self.headers.push(Header {
            name: name.to_string(),
            value,
        });
    }

    /// True when nothing should be added to the response.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Number of headers to emit.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Borrowed `(name, value)` pairs in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    /// Looks a header up by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// The CSP header, whichever of the two variants was emitted.
    pub fn content_security_policy(&self) -> Option<&Header> {
        self.headers.iter().find(|h| {
            h.name == CONTENT_SECURITY_POLICY || h.name == CONTENT_SECURITY_POLICY_REPORT_ONLY
        })
    }

    pub fn report_to(&self) -> Option<&str> {
        self.get(REPORT_TO)
    }
}

impl IntoIterator for RenderedHeaders {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers
            .into_iter()
            .map(|h| (h.name, h.value))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

/// Header name for a mode, or `None` when nothing should be sent.
pub fn header_name(mode: PolicyMode) -> Option<&'static str> {
    match mode {
        PolicyMode::Enforce => Some(CONTENT_SECURITY_POLICY),
        PolicyMode::ReportOnly => Some(CONTENT_SECURITY_POLICY_REPORT_ONLY),
        PolicyMode::Disabled => None,
    }
}

/// The policy string without a header name: active clauses in registry
/// order, joined by `"; "`. Empty when no directive is active.
pub fn policy_value(model: &PolicyModel) -> String {
    registry::list_directives()
        .iter()
        .filter_map(|directive| {
            let value = collapse_separators(model.active_value(directive.id)?);
            (!value.is_empty()).then(|| format!("{} {}", directive.id, value))
        })
        .collect::<Vec<_>>()
        .join(CLAUSE_SEPARATOR)
}

/// Renders the header set for a model.
///
/// A disabled mode or a policy with no active directive produces no CSP
/// header. `Report-To` is emitted whenever it is configured, whatever the mode.
///
/// Header values never carry control characters other than HTAB. Inside a
/// directive value they act as token separators; in `Report-To` each one
/// becomes a space.
pub fn render(model: &PolicyModel) -> RenderedHeaders {
    let mut headers = RenderedHeaders::new();

    if let Some(name) = header_name(model.mode()) {
        let value = policy_value(model);
        if !value.is_empty() {
            headers.push(name, value);
        }
    }

    if let Some(report_to) = model.report_to() {
        let value = blank_controls(report_to);
        if !value.is_empty() {
            headers.push(REPORT_TO, value);
        }
    }

    headers
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c.is_control()
}

/// Splits on whitespace and control characters and rejoins with single spaces.
fn collapse_separators(value: &str) -> String {
    value
        .split(is_separator)
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn blank_controls(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() && c != '\t' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
