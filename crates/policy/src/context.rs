//! Audience contexts a policy can be configured for.
//!
//! Deciding which context applies to a request (is this the admin area, is
//! the visitor logged in) is the caller's job; this module only names them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequestContext {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "logged-in", alias = "logged_in")]
    LoggedIn,
    #[serde(rename = "frontend")]
    Frontend,
}

impl RequestContext {
    pub const ALL: [RequestContext; 3] = [
        RequestContext::Admin,
        RequestContext::LoggedIn,
        RequestContext::Frontend,
    ];

    /// Stable identifier used in storage records and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestContext::Admin => "admin",
            RequestContext::LoggedIn => "logged-in",
            RequestContext::Frontend => "frontend",
        }
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestContext {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(RequestContext::Admin),
            "logged-in" | "logged_in" => Ok(RequestContext::LoggedIn),
            "frontend" => Ok(RequestContext::Frontend),
            _ => Err(PolicyError::UnknownContext(s.to_string())),
        }
    }
}
