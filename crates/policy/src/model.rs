//! In-memory policy for one audience context.
//!
//! A [`PolicyModel`] is built from the loosely typed record the option store
//! hands us and is never mutated afterwards; a settings change produces a new
//! record and therefore a new model.

use std::collections::BTreeMap;
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::registry;

/// Record key holding the `Report-To` header value.
pub const REPORT_TO_KEY: &str = "header_reportto";
/// Record key holding the policy mode.
pub const MODE_KEY: &str = "mode";
/// Prefix of the per-directive enable flags.
pub const ENABLE_PREFIX: &str = "enable_";

/// How the policy for a context is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyMode {
    /// Sent as `Content-Security-Policy`.
    Enforce,
    /// Sent as `Content-Security-Policy-Report-Only`.
    ReportOnly,
    /// No CSP header is sent.
    #[default]
    Disabled,
}

impl PolicyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyMode::Enforce => "enforce",
            PolicyMode::ReportOnly => "report-only",
            PolicyMode::Disabled => "disabled",
        }
    }

    /// Parses a stored mode string. Returns `None` for anything unrecognised.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "enforce" | "enforced" | "on" | "1" => Some(PolicyMode::Enforce),
            "report-only" | "report_only" | "reportonly" | "report" => Some(PolicyMode::ReportOnly),
            "disabled" | "disable" | "off" | "0" | "" => Some(PolicyMode::Disabled),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of a single directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveEntry {
    pub enabled: bool,
    pub value: String,
}

impl DirectiveEntry {
    pub fn new(enabled: bool, value: impl Into<String>) -> Self {
        Self {
            enabled,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyModel {
    context: RequestContext,
    mode: PolicyMode,
    entries: BTreeMap<String, DirectiveEntry>,
    report_to: Option<String>,
}

impl PolicyModel {
    /// Creates a model with no directive entries.
    pub fn new(context: RequestContext, mode: PolicyMode) -> Self {
        Self {
            context,
            mode,
            entries: BTreeMap::new(),
            report_to: None,
        }
    }

    /// Adds or replaces a directive entry.
    pub fn with_entry(mut self, directive: &str, enabled: bool, value: impl Into<String>) -> Self {
        self.entries
            .insert(directive.to_string(), DirectiveEntry::new(enabled, value));
        self
    }

    /// Sets the `Report-To` header value. Blank values clear it.
    pub fn with_report_to(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.report_to = (!value.trim().is_empty()).then_some(value);
        self
    }

    /// Maps a stored record into the strict model.
    ///
    /// Unknown keys are ignored. A missing or unrecognised `mode` yields
    /// [`PolicyMode::Disabled`], and every registry directive missing from the
    /// record becomes a disabled entry with an empty value. Directive keys are
    /// accepted both hyphenated (`script-src`) and underscored (`script_src`).
    pub fn load(context: RequestContext, raw: &Value) -> Self {
        let empty = Map::new();
        let record = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                warn!(
                    "policy record for {} is a {} rather than an object, using defaults",
                    context,
                    json_type(other)
                );
                &empty
            }
        };

        let mode = match record.get(MODE_KEY) {
            None | Some(Value::Null) => PolicyMode::Disabled,
            Some(Value::String(raw_mode)) => {
                PolicyMode::from_raw(raw_mode).unwrap_or_else(|| {
                    warn!(
                        "unrecognised policy mode {:?} for {}, treating as disabled",
                        raw_mode, context
                    );
                    PolicyMode::Disabled
                })
            }
            Some(other) => {
                warn!(
                    "policy mode for {} is a {}, treating as disabled",
                    context,
                    json_type(other)
                );
                PolicyMode::Disabled
            }
        };

        let mut entries = BTreeMap::new();
        for directive in registry::list_directives() {
            let underscored = directive.id.replace('-', "_");
            let enabled = lookup_either(
                record,
                &format!("{ENABLE_PREFIX}{}", directive.id),
                &format!("{ENABLE_PREFIX}{underscored}"),
            )
            .map_or(false, flag_value);
            let value = lookup_either(record, directive.id, &underscored)
                .and_then(Value::as_str)
                .unwrap_or_default();
            entries.insert(
                directive.id.to_string(),
                DirectiveEntry::new(enabled, value),
            );
        }

        let report_to = record
            .get(REPORT_TO_KEY)
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string);

        Self {
            context,
            mode,
            entries,
            report_to,
        }
    }

    /// Inverse of [`PolicyModel::load`], in the hyphenated record shape.
    pub fn to_record(&self) -> Value {
        let mut record = Map::new();
        record.insert(MODE_KEY.to_string(), Value::from(self.mode.as_str()));
        for (id, entry) in &self.entries {
            record.insert(
                format!("{ENABLE_PREFIX}{id}"),
                Value::from(u8::from(entry.enabled)),
            );
            record.insert(id.clone(), Value::from(entry.value.clone()));
        }
        record.insert(
            REPORT_TO_KEY.to_string(),
            Value::from(self.report_to.clone().unwrap_or_default()),
        );
        Value::Object(record)
    }

    /// Audience context the model belongs to.
    pub fn context(&self) -> RequestContext {
        self.context
    }

    /// Delivery mode of the policy.
    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    /// Raw `Report-To` header value, if one is configured.
    pub fn report_to(&self) -> Option<&str> {
        self.report_to.as_deref()
    }

    /// Entry for a directive, active or not.
    pub fn entry(&self, directive: &str) -> Option<&DirectiveEntry> {
        self.entries.get(directive)
    }

    /// Entries in directive-name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &DirectiveEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// True iff the directive is known, enabled and has a non-blank value.
    pub fn is_directive_active(&self, directive: &str) -> bool {
        self.active_value(directive).is_some()
    }

    /// The trimmed value of an active directive.
    pub fn active_value(&self, directive: &str) -> Option<&str> {
        if !registry::is_known(directive) {
            return None;
        }
        let entry = self.entries.get(directive)?;
        let value = entry.value.trim();
        (entry.enabled && !value.is_empty()).then_some(value)
    }
}

fn lookup_either<'a>(
    record: &'a Map<String, Value>,
    primary: &str,
    fallback: &str,
) -> Option<&'a Value> {
    record.get(primary).or_else(|| record.get(fallback))
}

/// Interprets the loosely typed enable flags the option store produces.
fn flag_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        _ => false,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_load_full_record() {
        let raw = json!({
            "mode": "enforce",
            "enable_default-src": 1,
            "default-src": "'self'",
            "enable_img-src": "1",
            "img-src": "https:",
            "header_reportto": "{\"group\":\"csp\"}",
        });
        let model = PolicyModel::load(RequestContext::Admin, &raw);

        assert_eq!(model.context(), RequestContext::Admin);
        assert_eq!(model.mode(), PolicyMode::Enforce);
        assert_eq!(model.active_value("default-src"), Some("'self'"));
        assert_eq!(model.active_value("img-src"), Some("https:"));
        assert_eq!(model.report_to(), Some("{\"group\":\"csp\"}"));
    }

    #[test]
    fn test_load_defaults_missing_fields() {
        let model = PolicyModel::load(RequestContext::Frontend, &json!({}));
        assert_eq!(model.mode(), PolicyMode::Disabled);
        assert_eq!(model.report_to(), None);
        for directive in registry::list_directives() {
            assert_eq!(model.entry(directive.id), Some(&DirectiveEntry::default()));
        }
    }

    #[test]
    fn test_load_ignores_unknown_keys_and_bad_types() {
        let raw = json!({
            "mode": 7,
            "enable_script-source": 1,
            "script-source": "'self'",
            "enable_script-src": true,
            "script-src": ["'self'"],
        });
        let model = PolicyModel::load(RequestContext::LoggedIn, &raw);
        assert_eq!(model.mode(), PolicyMode::Disabled);
        assert!(model.entry("script-source").is_none());
        assert!(!model.is_directive_active("script-src"));
        assert_eq!(
            model.entry("script-src"),
            Some(&DirectiveEntry::new(true, ""))
        );
    }

    #[test]
    fn test_load_accepts_underscored_keys() {
        let raw = json!({
            "mode": "report_only",
            "enable_frame_ancestors": "on",
            "frame_ancestors": "'none'",
        });
        let model = PolicyModel::load(RequestContext::Admin, &raw);
        assert_eq!(model.mode(), PolicyMode::ReportOnly);
        assert_eq!(model.active_value("frame-ancestors"), Some("'none'"));
    }

    #[test]
    fn test_non_object_record_is_disabled() {
        let model = PolicyModel::load(RequestContext::Admin, &json!("enforce"));
        assert_eq!(model.mode(), PolicyMode::Disabled);
        let model = PolicyModel::load(RequestContext::Admin, &Value::Null);
        assert_eq!(model.mode(), PolicyMode::Disabled);
    }

    #[test]
    fn test_unknown_mode_is_disabled() {
        let model = PolicyModel::load(RequestContext::Admin, &json!({"mode": "strict"}));
        assert_eq!(model.mode(), PolicyMode::Disabled);
    }

    #[test]
    fn test_directive_activity() {
        let model = PolicyModel::new(RequestContext::Admin, PolicyMode::Enforce)
            .with_entry("default-src", true, "  'self'  ")
            .with_entry("img-src", true, "   ")
            .with_entry("font-src", false, "https:")
            .with_entry("made-up-src", true, "'self'");

        assert!(model.is_directive_active("default-src"));
        assert_eq!(model.active_value("default-src"), Some("'self'"));
        assert!(!model.is_directive_active("img-src"));
        assert!(!model.is_directive_active("font-src"));
        assert!(!model.is_directive_active("made-up-src"));
        assert!(!model.is_directive_active("media-src"));
    }

    #[test]
    fn test_record_round_trip() {
        let model = PolicyModel::new(RequestContext::Frontend, PolicyMode::ReportOnly)
            .with_entry("script-src", true, "'self' https://cdn.example.com")
            .with_entry("object-src", false, "'none'")
            .with_report_to("{\"group\":\"default\"}");

        let reloaded = PolicyModel::load(RequestContext::Frontend, &model.to_record());
        assert_eq!(reloaded.mode(), PolicyMode::ReportOnly);
        assert_eq!(reloaded.entry("script-src"), model.entry("script-src"));
        assert_eq!(reloaded.entry("object-src"), model.entry("object-src"));
        assert_eq!(reloaded.report_to(), model.report_to());
    }

    #[test]
    fn test_blank_report_to_is_cleared() {
        let model =
            PolicyModel::new(RequestContext::Admin, PolicyMode::Enforce).with_report_to("  ");
        assert_eq!(model.report_to(), None);
    }
}
