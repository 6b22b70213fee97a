#![no_main]
//! Content Security Policy focused fuzzing
//!
//! Feeds arbitrary directive names, values and modes through validation and
//! rendering and checks that:
//! - nothing panics
//! - rendered policies never contain `;;` or a leading/trailing `;`
//! - no header value carries a control character other than HTAB
//! - a disabled policy never produces a CSP header

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;

use sitecsp_policy::registry::list_directives;
use sitecsp_policy::{render, validate, validate_value, PolicyMode, PolicyModel, RequestContext};

#[derive(Debug, Clone, Arbitrary)]
pub struct DirectiveFuzz {
    /// Index into the registry, or a raw (possibly unknown) name
    pub known: Option<u8>,
    pub raw_name: String,
    pub enabled: bool,
    pub value: String,
}

#[derive(Debug, Clone, Arbitrary)]
pub struct CspFuzzInput {
    pub mode: u8,
    pub directives: Vec<DirectiveFuzz>,
    pub report_to: String,
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);
    let input = match CspFuzzInput::arbitrary(&mut unstructured) {
        Ok(input) => input,
        Err(_) => return,
    };

    let mode = match input.mode % 3 {
        0 => PolicyMode::Enforce,
        1 => PolicyMode::ReportOnly,
        _ => PolicyMode::Disabled,
    };
    let registry = list_directives();

    let mut model =
        PolicyModel::new(RequestContext::Frontend, mode).with_report_to(input.report_to);
    for directive in input.directives.iter().take(64) {
        let name = match directive.known {
            Some(i) => registry[i as usize % registry.len()].id.to_string(),
            None => directive.raw_name.clone(),
        };
        let _ = validate_value(&name, &directive.value);
        model = model.with_entry(&name, directive.enabled, directive.value.clone());
    }

    let _ = validate(&model);
    let headers = render(&model);

    if let Some(csp) = headers.content_security_policy() {
        assert!(mode != PolicyMode::Disabled);
        assert!(!csp.value.contains(";;"));
        assert!(!csp.value.starts_with(';'));
        assert!(!csp.value.ends_with(';'));
    }
    for (_, value) in headers.iter() {
        assert!(!value.chars().any(|c| c.is_control() && c != '\t'));
    }
    assert_eq!(headers, render(&model));
});
