use std::error::Error;
use std::sync::Arc;

use sitecsp_policy::{HeaderDispatcher, LogSink, PolicySnapshot, RequestContext};

const STORED_OPTIONS: &str = r#"{
    "admin": {
        "mode": "report-only",
        "enable_default-src": 1,
        "default-src": "'self'",
        "enable_script-src": 1,
        "script-src": "'self' 'unsafe-inline'"
    },
    "logged-in": {
        "mode": "enforce",
        "enable_default-src": 1,
        "default-src": "'self'",
        "enable_object-src": 1,
        "object-src": "'none' https:"
    },
    "frontend": {
        "mode": "enforce",
        "enable_default-src": 1,
        "default-src": "'self'",
        "enable_img-src": 1,
        "img-src": "'self' data: *.gravatar.com",
        "enable_report-to": 1,
        "report-to": "csp",
        "header_reportto": "{\"group\":\"csp\",\"max_age\":86400,\"endpoints\":[{\"url\":\"https://example.com/r\"}]}"
    }
}"#;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Pass a JSON file to render your own options instead of the built-in ones
    let snapshot = match std::env::args().nth(1) {
        Some(path) => PolicySnapshot::from_json_str(&std::fs::read_to_string(path)?)?,
        None => PolicySnapshot::from_json_str(STORED_OPTIONS)?,
    };

    let dispatcher = HeaderDispatcher::new(snapshot, Arc::new(LogSink));
    for context in RequestContext::ALL {
        println!("[{}]", context);
        let headers = dispatcher.resolve_context(context);
        if headers.is_empty() {
            println!("  (no headers)");
        }
        for (name, value) in headers.iter() {
            println!("  {}: {}", name, value);
        }
    }

    Ok(())
}
