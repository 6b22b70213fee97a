//! Syntax checks for configured directive values.
//!
//! Validation is advisory. It never mutates the model and never stops the
//! serializer from rendering a value; it only produces results that the
//! dispatcher forwards to a diagnostics sink.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use url::Url;

use crate::error::{PolicyError, Severity};
use crate::hash::HashAlgorithm;
use crate::model::PolicyModel;
use crate::registry::{self, Directive, ValueSyntax};

lazy_static! {
    static ref NONCE_SOURCE: Regex =
        Regex::new(r"^'(?i:nonce)-[A-Za-z0-9+/_\-]+={0,2}'$").expect("nonce pattern");
    static ref HASH_SOURCE: Regex =
        Regex::new(r"^'(?i:(sha256|sha384|sha512))-([A-Za-z0-9+/_\-]+={0,2})'$")
            .expect("hash pattern");
    static ref SCHEME_SOURCE: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:$").expect("scheme pattern");
    static ref HOST_SOURCE: Regex = Regex::new(concat!(
        r"^(?:(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]*)://)?",
        r"(?P<host>\*|(?:\*\.)?[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*)",
        r"(?::(?P<port>[0-9]+|\*))?",
        r"(?P<path>/[^\s;,']*)?$",
    ))
    .expect("host pattern");
    static ref REPORTING_GROUP: Regex =
        Regex::new(r"^[!#$%&'*+.^_`|~0-9A-Za-z\-]+$").expect("token pattern");
}

/// Quoted keywords accepted in source lists.
const KEYWORDS: &[&str] = &[
    "'self'",
    "'unsafe-inline'",
    "'unsafe-eval'",
    "'unsafe-hashes'",
    "'none'",
    "'strict-dynamic'",
    "'report-sample'",
    "'wasm-unsafe-eval'",
];

/// Schemes a host-source may spell out in front of `://`.
const HOST_SOURCE_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

const SANDBOX_FLAGS: &[&str] = &[
    "allow-downloads",
    "allow-forms",
    "allow-modals",
    "allow-orientation-lock",
    "allow-pointer-lock",
    "allow-popups",
    "allow-popups-to-escape-sandbox",
    "allow-presentation",
    "allow-same-origin",
    "allow-scripts",
    "allow-storage-access-by-user-activation",
    "allow-top-navigation",
    "allow-top-navigation-by-user-activation",
    "allow-top-navigation-to-custom-protocols",
];

/// A recognised source expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceExpression {
    Keyword(String),
    Nonce(String),
    Hash {
        algorithm: HashAlgorithm,
        digest: String,
    },
    Scheme(String),
    Host(String),
    Wildcard,
}

impl SourceExpression {
    /// Classifies one whitespace-free token, or returns `None` if it is not
    /// a well-formed source expression.
    pub fn parse(token: &str) -> Option<Self> {
        let lowered = token.to_ascii_lowercase();
        if token == "*" {
            return Some(SourceExpression::Wildcard);
        }
        if KEYWORDS.contains(&lowered.as_str()) {
            return Some(SourceExpression::Keyword(lowered));
        }
        if is_unquoted_keyword(&lowered) {
            return None;
        }
        if NONCE_SOURCE.is_match(token) {
            let value = &token["'nonce-".len()..token.len() - 1];
            return Some(SourceExpression::Nonce(value.to_string()));
        }
        if let Some(caps) = HASH_SOURCE.captures(token) {
            let algorithm = HashAlgorithm::from_prefix(&caps[1])?;
            let digest = &caps[2];
            if decoded_len(digest) != Some(algorithm.digest_len()) {
                return None;
            }
            return Some(SourceExpression::Hash {
                algorithm,
                digest: digest.to_string(),
            });
        }
        if SCHEME_SOURCE.is_match(token) {
            return Some(SourceExpression::Scheme(lowered));
        }
        if is_host_source(token) {
            return Some(SourceExpression::Host(token.to_string()));
        }
        None
    }

    /// Whether the expression may appear in `frame-ancestors`.
    fn allowed_in_ancestor_list(&self) -> bool {
        match self {
            SourceExpression::Keyword(k) => k == "'self'" || k == "'none'",
            SourceExpression::Scheme(_)
            | SourceExpression::Host(_)
            | SourceExpression::Wildcard => true,
            SourceExpression::Nonce(_) | SourceExpression::Hash { .. } => false,
        }
    }
}

fn is_unquoted_keyword(lowered: &str) -> bool {
    KEYWORDS.iter().any(|k| k.trim_matches('\'') == lowered)
}

fn decoded_len(digest: &str) -> Option<usize> {
    [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(digest).ok())
        .map(|bytes| bytes.len())
}

fn is_host_source(token: &str) -> bool {
    let caps = match HOST_SOURCE.captures(token) {
        Some(caps) => caps,
        None => return false,
    };

    if let Some(scheme) = caps.name("scheme") {
        let scheme = scheme.as_str().to_ascii_lowercase();
        if !HOST_SOURCE_SCHEMES.contains(&scheme.as_str()) {
            return false;
        }
    }

    if let Some(port) = caps.name("port") {
        if port.as_str() != "*" && port.as_str().parse::<u16>().is_err() {
            return false;
        }
    }

    let host = &caps["host"];
    if host == "*" {
        return true;
    }
    let host = host.strip_prefix("*.").unwrap_or(host);
    if host.split('.').any(|label| label.starts_with('-') || label.ends_with('-')) {
        return false;
    }
    Url::parse(&format!("https://{host}/"))
        .map(|url| url.host_str().is_some())
        .unwrap_or(false)
}

/// Outcome for one directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStatus {
    Valid,
    Invalid(PolicyError),
}

/// Validation outcome attributed to a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Directive name as it appears in the model
    pub directive: String,
    /// Whether the directive passed, and the error if it did not
    pub status: ValidationStatus,
}

impl ValidationResult {
    fn invalid(error: PolicyError) -> Self {
        let directive = error.directive().unwrap_or_default().to_string();
        Self {
            directive,
            status: ValidationStatus::Invalid(error),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }

    pub fn error(&self) -> Option<&PolicyError> {
        match &self.status {
            ValidationStatus::Valid => None,
            ValidationStatus::Invalid(err) => Some(err),
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        self.error().map(PolicyError::severity)
    }
}

/// Checks every enabled entry of a model.
///
/// Only problems are returned, so a clean policy yields an empty vector.
/// Results follow registry order, then unknown entries by name.
pub fn validate(model: &PolicyModel) -> Vec<ValidationResult> {
    let mut results = Vec::new();

    for directive in registry::list_directives() {
        let entry = match model.entry(directive.id) {
            Some(entry) if entry.enabled => entry,
            _ => continue,
        };
        if entry.value.trim().is_empty() {
            results.push(ValidationResult::invalid(PolicyError::EmptyDirectiveValue {
                directive: directive.id.to_string(),
            }));
            continue;
        }
        results.extend(
            check_value(directive, &entry.value)
                .into_iter()
                .map(ValidationResult::invalid),
        );
    }

    for (id, _) in model.entries().filter(|(id, _)| !registry::is_known(id)) {
        results.push(ValidationResult::invalid(PolicyError::UnknownDirective {
            directive: id.to_string(),
        }));
    }

    debug!(
        "validated {} policy ({}): {} problem(s)",
        model.context(),
        model.mode(),
        results.len()
    );
    results
}

/// Checks a single directive value, e.g. before the settings layer stores it.
pub fn validate_value(directive: &str, value: &str) -> Vec<PolicyError> {
    match registry::lookup(directive) {
        Some(known) => check_value(known, value),
        None => vec![PolicyError::UnknownDirective {
            directive: directive.to_string(),
        }],
    }
}

fn check_value(directive: &Directive, value: &str) -> Vec<PolicyError> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let malformed = |token: &str| PolicyError::MalformedSourceExpression {
        directive: directive.id.to_string(),
        token: token.to_string(),
    };
    let mut errors = Vec::new();

    match directive.syntax {
        ValueSyntax::SourceList | ValueSyntax::AncestorSourceList => {
            let ancestors = directive.syntax == ValueSyntax::AncestorSourceList;
            for &token in &tokens {
                let accepted = match SourceExpression::parse(token) {
                    Some(expr) => !ancestors || expr.allowed_in_ancestor_list(),
                    None => false,
                };
                if !accepted {
                    errors.push(malformed(token));
                }
            }
            if tokens.len() > 1 && tokens.iter().any(|t| t.eq_ignore_ascii_case("'none'")) {
                errors.push(PolicyError::ConflictingNoneKeyword {
                    directive: directive.id.to_string(),
                });
            }
        }
        ValueSyntax::SandboxFlags => {
            errors.extend(
                tokens
                    .iter()
                    .copied()
                    .filter(|t| !SANDBOX_FLAGS.contains(&t.to_ascii_lowercase().as_str()))
                    .map(malformed),
            );
        }
        ValueSyntax::UriReferences => {
            errors.extend(
                tokens
                    .iter()
                    .copied()
                    .filter(|t| !is_report_uri(t))
                    .map(malformed),
            );
        }
        ValueSyntax::ReportingGroup => {
            for (i, &token) in tokens.iter().enumerate() {
                if i > 0 || !REPORTING_GROUP.is_match(token) {
                    errors.push(malformed(token));
                }
            }
        }
    }

    errors
}

fn is_report_uri(token: &str) -> bool {
    if token.starts_with('/') {
        return !token.contains([';', ',']);
    }
    Url::parse(token)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::hash::hash_source;
    use crate::model::PolicyMode;
    use pretty_assertions::assert_eq;

    fn malformed(directive: &str, token: &str) -> PolicyError {
        PolicyError::MalformedSourceExpression {
            directive: directive.to_string(),
            token: token.to_string(),
        }
    }

    #[test]
    fn test_keywords() {
        for keyword in KEYWORDS {
            assert!(SourceExpression::parse(keyword).is_some(), "{keyword}");
        }
        assert_eq!(
            SourceExpression::parse("'SELF'"),
            Some(SourceExpression::Keyword("'self'".into()))
        );
        assert_eq!(SourceExpression::parse("self"), None);
        assert_eq!(SourceExpression::parse("unsafe-inline"), None);
        assert_eq!(SourceExpression::parse("'self"), None);
        assert_eq!(SourceExpression::parse("'invalid'"), None);
    }

    #[test]
    fn test_nonces() {
        assert_eq!(
            SourceExpression::parse("'nonce-abc123=='"),
            Some(SourceExpression::Nonce("abc123==".into()))
        );
        assert_eq!(SourceExpression::parse("'nonce-'"), None);
        assert_eq!(SourceExpression::parse("'nonce-abc'def'"), None);
        assert_eq!(SourceExpression::parse("'nonce-ab=c'"), None);
    }

    #[test]
    fn test_hashes_must_match_digest_length() {
        let sha256 = hash_source(HashAlgorithm::Sha256, b"alert(1)");
        let sha384 = hash_source(HashAlgorithm::Sha384, b"alert(1)");
        let sha512 = hash_source(HashAlgorithm::Sha512, b"alert(1)");
        for source in [&sha256, &sha384, &sha512] {
            assert!(
                matches!(
                    SourceExpression::parse(source),
                    Some(SourceExpression::Hash { .. })
                ),
                "{source}"
            );
        }

        assert_eq!(SourceExpression::parse("'sha256-abc123def456'"), None);
        assert_eq!(SourceExpression::parse("'sha256-'"), None);
        assert_eq!(SourceExpression::parse("'sha999-abc123'"), None);
        // a sha256 digest labelled as sha384
        let mislabelled = sha256.replacen("sha256", "sha384", 1);
        assert_eq!(SourceExpression::parse(&mislabelled), None);
    }

    #[test]
    fn test_schemes_and_hosts() {
        for token in ["https:", "data:", "blob:", "wss:"] {
            assert_eq!(
                SourceExpression::parse(token),
                Some(SourceExpression::Scheme(token.into()))
            );
        }
        for token in [
            "example.com",
            "*.example.com",
            "https://example.com",
            "https://*.example.com:443",
            "example.com:*",
            "https://example.com/path/to/scripts/",
            "wss://socket.example.com:8443",
            "localhost",
        ] {
            assert_eq!(
                SourceExpression::parse(token),
                Some(SourceExpression::Host(token.into())),
                "{token}"
            );
        }
        assert_eq!(
            SourceExpression::parse("*"),
            Some(SourceExpression::Wildcard)
        );
    }

    #[test]
    fn test_rejects_malformed_hosts() {
        for token in [
            "javascript://evil",
            "data://payload",
            "https://",
            "https://example.com:99999",
            "exa_mple.com",
            "*.*.example.com",
            "example.*.com",
            "-bad.example.com",
            "https://example.com/a;b",
        ] {
            assert_eq!(SourceExpression::parse(token), None, "{token}");
        }
    }

    #[test]
    fn test_none_with_other_sources_conflicts_once() {
        let errors = validate_value("object-src", "'none' https:");
        assert_eq!(
            errors,
            vec![PolicyError::ConflictingNoneKeyword {
                directive: "object-src".into()
            }]
        );
        assert!(validate_value("object-src", "'none'").is_empty());
    }

    #[test]
    fn test_frame_ancestors_grammar() {
        assert!(
            validate_value("frame-ancestors", "'self' https://partner.example.com").is_empty()
        );
        assert_eq!(
            validate_value("frame-ancestors", "'self' 'unsafe-inline'"),
            vec![malformed("frame-ancestors", "'unsafe-inline'")]
        );
    }

    #[test]
    fn test_sandbox_flags() {
        assert!(validate_value("sandbox", "allow-forms allow-scripts").is_empty());
        assert_eq!(
            validate_value("sandbox", "allow-forms allow-everything"),
            vec![malformed("sandbox", "allow-everything")]
        );
    }

    #[test]
    fn test_report_uri_and_group() {
        assert!(
            validate_value("report-uri", "/csp-report https://reports.example.com/csp").is_empty()
        );
        assert_eq!(
            validate_value("report-uri", "javascript:alert(1)"),
            vec![malformed("report-uri", "javascript:alert(1)")]
        );
        assert!(validate_value("report-to", "csp-endpoint").is_empty());
        assert_eq!(
            validate_value("report-to", "csp-endpoint other"),
            vec![malformed("report-to", "other")]
        );
    }

    #[test]
    fn test_unknown_directive_value() {
        assert_eq!(
            validate_value("script-source", "'self'"),
            vec![PolicyError::UnknownDirective {
                directive: "script-source".into()
            }]
        );
    }

    #[test]
    fn test_validate_model_orders_and_attributes_results() {
        let model = PolicyModel::new(RequestContext::Frontend, PolicyMode::Enforce)
            .with_entry("zz-src", true, "'self'")
            .with_entry("script-src", true, "'self' javascript://evil")
            .with_entry("img-src", true, "")
            .with_entry("default-src", true, "self")
            .with_entry("font-src", false, "garbage!");

        let results = validate(&model);
        let summary: Vec<(&str, Option<&PolicyError>)> = results
            .iter()
            .map(|r| (r.directive.as_str(), r.error()))
            .collect();
        let empty_img = PolicyError::EmptyDirectiveValue {
            directive: "img-src".into(),
        };
        let unknown = PolicyError::UnknownDirective {
            directive: "zz-src".into(),
        };

        assert_eq!(
            summary,
            vec![
                ("default-src", Some(&malformed("default-src", "self"))),
                ("script-src", Some(&malformed("script-src", "javascript://evil"))),
                ("img-src", Some(&empty_img)),
                ("zz-src", Some(&unknown)),
            ]
        );
        assert_eq!(results[2].severity(), Some(Severity::Warning));
        assert!(results.iter().all(|r| !r.is_valid()));
    }

    #[test]
    fn test_clean_model_has_no_results() {
        let model = PolicyModel::new(RequestContext::Admin, PolicyMode::ReportOnly)
            .with_entry("default-src", true, "'self'")
            .with_entry(
                "script-src",
                true,
                "'self' 'nonce-r4nd0m' 'strict-dynamic' https:",
            )
            .with_entry("img-src", true, "'self' data: *.gravatar.com")
            .with_entry("report-uri", true, "/csp-report");
        assert!(validate(&model).is_empty());
    }
}
