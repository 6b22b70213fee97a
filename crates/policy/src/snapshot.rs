//! Immutable set of per-context policies.
//!
//! The option store is read once per configuration refresh into a
//! [`PolicySnapshot`]; requests only ever read it. A settings change means a
//! new snapshot, never an in-place edit.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::error::{PolicyError, PolicyResult};
use crate::model::{PolicyMode, PolicyModel, ENABLE_PREFIX, MODE_KEY, REPORT_TO_KEY};
use crate::registry;

/// Conservative starting values offered for each directive.
///
/// These only pre-fill the settings form; every directive starts disabled.
fn suggested_value(directive: &str) -> &'static str {
    match directive {
        "object-src" | "base-uri" => "'none'",
        "frame-ancestors" | "form-action" => "'self'",
        "img-src" => "'self' data:",
        "connect-src" | "font-src" | "manifest-src" | "worker-src" => "'self'",
        "sandbox" | "report-uri" | "report-to" => "",
        "script-src-attr" | "style-src-attr" | "script-src-elem" | "style-src-elem" => "",
        _ => "'self'",
    }
}

/// The record seeded into storage when a context has never been configured.
pub fn default_record(context: RequestContext) -> Value {
    let mut record = Map::new();
    record.insert(
        MODE_KEY.to_string(),
        Value::from(PolicyMode::Disabled.as_str()),
    );
    for directive in registry::list_directives() {
        record.insert(format!("{ENABLE_PREFIX}{}", directive.id), Value::from(0));
        record.insert(
            directive.id.to_string(),
            Value::from(suggested_value(directive.id)),
        );
    }
    record.insert(REPORT_TO_KEY.to_string(), Value::from(""));
    debug!("built default policy record for {}", context);
    Value::Object(record)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    models: BTreeMap<RequestContext, PolicyModel>,
}

impl PolicySnapshot {
    /// A snapshot with no stored record for any context.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every context bootstrapped from [`default_record`].
    pub fn with_defaults() -> Self {
        Self::from_models(
            RequestContext::ALL
                .iter()
                .map(|&context| PolicyModel::load(context, &default_record(context))),
        )
    }

    /// Keys models by their own context; a later model for the same context
    /// replaces an earlier one.
    pub fn from_models<I>(models: I) -> Self
    where
        I: IntoIterator<Item = PolicyModel>,
    {
        Self {
            models: models.into_iter().map(|m| (m.context(), m)).collect(),
        }
    }

    /// Loads from a JSON object keyed by context id.
    ///
    /// Unrecognised context keys are skipped with a warning. Contexts absent
    /// from the object stay absent, which the dispatcher reports as a missing
    /// record.
    pub fn from_records(records: &Value) -> PolicyResult<Self> {
        let object = records.as_object().ok_or_else(|| {
            PolicyError::InvalidConfiguration("policy snapshot must be a JSON object".to_string())
        })?;

        let mut models = BTreeMap::new();
        for (key, raw) in object {
            match key.parse::<RequestContext>() {
                Ok(context) => {
                    models.insert(context, PolicyModel::load(context, raw));
                }
                Err(_) => warn!("ignoring policy record for unknown context {:?}", key),
            }
        }
        Ok(Self { models })
    }

    pub fn from_json_str(json: &str) -> PolicyResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_records(&value)
    }

    /// The stored-record form of every model, keyed by context id.
    pub fn to_records(&self) -> Value {
        Value::Object(
            self.models
                .iter()
                .map(|(context, model)| (context.as_str().to_string(), model.to_record()))
                .collect(),
        )
    }

    pub fn get(&self, context: RequestContext) -> Option<&PolicyModel> {
        self.models.get(&context)
    }

    pub fn contexts(&self) -> impl Iterator<Item = RequestContext> + '_ {
        self.models.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::validate_value;
    use serde_json::json;

    #[test]
    fn test_defaults_are_disabled_and_valid() {
        let snapshot = PolicySnapshot::with_defaults();
        assert_eq!(snapshot.len(), 3);
        for context in RequestContext::ALL {
            let model = snapshot.get(context).unwrap();
            assert_eq!(model.mode(), PolicyMode::Disabled);
            assert_eq!(model.report_to(), None);
            for (id, entry) in model.entries() {
                assert!(!entry.enabled, "{id} should start disabled");
                if !entry.value.is_empty() {
                    assert!(
                        validate_value(id, &entry.value).is_empty(),
                        "{id}: {}",
                        entry.value
                    );
                }
            }
        }
    }

    #[test]
    fn test_from_records_skips_unknown_contexts() {
        let snapshot = PolicySnapshot::from_records(&json!({
            "admin": {"mode": "enforce", "enable_default-src": 1, "default-src": "'self'"},
            "logged_in": {"mode": "report-only"},
            "api": {"mode": "enforce"},
        }))
        .unwrap();

        assert_eq!(
            snapshot.contexts().collect::<Vec<_>>(),
            vec![RequestContext::Admin, RequestContext::LoggedIn]
        );
        assert_eq!(
            snapshot.get(RequestContext::LoggedIn).unwrap().mode(),
            PolicyMode::ReportOnly
        );
        assert!(snapshot.get(RequestContext::Frontend).is_none());
    }

    #[test]
    fn test_from_json_str_errors() {
        assert!(matches!(
            PolicySnapshot::from_json_str("{"),
            Err(PolicyError::Json(_))
        ));
        assert!(matches!(
            PolicySnapshot::from_json_str("[]"),
            Err(PolicyError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_records_round_trip() {
        let snapshot = PolicySnapshot::from_models([
            PolicyModel::new(RequestContext::Frontend, PolicyMode::Enforce)
                .with_entry("default-src", true, "'self'")
                .with_report_to("{\"group\":\"csp\"}"),
        ]);
        let reloaded = PolicySnapshot::from_records(&snapshot.to_records()).unwrap();
        let model = reloaded.get(RequestContext::Frontend).unwrap();
        assert_eq!(model.active_value("default-src"), Some("'self'"));
        assert_eq!(model.report_to(), Some("{\"group\":\"csp\"}"));
    }
}
