//! Identifier harvesting from response bodies

use regex::Regex;

use crate::error::EngineResult;
use crate::session::Session;

/// What a harvest did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestOutcome {
    /// Distinct identifiers found in the body
    pub found: usize,
    /// Identifiers that were new to the session
    pub added: usize,
    /// The static list was used because nothing was found
    pub used_fallback: bool,
}

/// Extracts entity identifiers with a fixed pattern.
///
/// If the pattern has a capture group, group 1 is the identifier, otherwise
/// the whole match is.
#[derive(Debug, Clone)]
pub struct IdHarvester {
    pattern: Regex,
    fallback: Vec<String>,
}

impl IdHarvester {
    /// Create a new harvester; fails if the pattern does not compile
    pub fn new(pattern: &str, fallback: Vec<String>) -> EngineResult<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            fallback,
        })
    }

    /// The same pattern with a different fallback list
    pub fn with_fallback(&self, fallback: Vec<String>) -> Self {
        Self {
            pattern: self.pattern.clone(),
            fallback,
        }
    }

    pub fn fallback(&self) -> &[String] {
        &self.fallback
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// All distinct identifiers in `body`, in first-seen order
    pub fn extract(&self, body: &str) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for captures in self.pattern.captures_iter(body) {
            let Some(found) = captures.get(1).or_else(|| captures.get(0)) else {
                continue;
            };
            let id = found.as_str();
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }
        ids
    }

    /// Add the identifiers in `body` to the session.
    ///
    /// When nothing matches and the session has no identifiers yet, the
    /// session receives exactly the fallback list so later steps always have
    /// something to work with.
    pub fn harvest(&self, body: &str, session: &mut Session) -> HarvestOutcome {
        let ids = self.extract(body);
        if ids.is_empty() {
            let used_fallback = session.discovered_ids().is_empty();
            let added = if used_fallback {
                session.extend_ids(self.fallback.iter().cloned())
            } else {
                0
            };
            return HarvestOutcome {
                found: 0,
                added,
                used_fallback,
            };
        }

        let found = ids.len();
        let added = session.extend_ids(ids);
        HarvestOutcome {
            found,
            added,
            used_fallback: false,
        }
    }
}
