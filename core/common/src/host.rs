//! Repository clone URL parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

static SSH_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.-]+@([\w.-]+):([\w-]+)/([\w.-]+)\.git$").expect("valid ssh host pattern")
});

static HTTPS_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://([\w.-]+)/([\w-]+)/([\w.-]+)\.git$").expect("valid https host pattern")
});

/// Provider, owner and repository parsed from a clone URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostLocator {
    /// Host name, used as the registry key (e.g. `github.com`).
    pub provider: String,
    pub owner: String,
    pub repo: String,
}

impl HostLocator {
    /// Parse `user@host:owner/repo.git` or `https://host/owner/repo.git`.
    ///
    /// # Errors
    /// - `MalformedHost` if neither form matches
    pub fn parse(host: &str) -> Result<Self> {
        let trimmed = host.trim();
        [&*SSH_HOST, &*HTTPS_HOST]
            .iter()
            .find_map(|pattern| pattern.captures(trimmed))
            .map(|caps| Self {
                provider: caps[1].to_string(),
                owner: caps[2].to_string(),
                repo: caps[3].to_string(),
            })
            .ok_or_else(|| Error::MalformedHost(host.to_string()))
    }
}

impl fmt::Display for HostLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.provider, self.owner, self.repo)
    }
}
