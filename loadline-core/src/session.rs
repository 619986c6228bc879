//! Per-iteration session state

use chrono::{DateTime, Utc};
use cookie::time::{Duration as CookieDuration, OffsetDateTime};
use cookie::Cookie;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use uuid::Uuid;

/// Cookies per logical host.
///
/// Only name/value pairs are kept. A cookie is removed when the target sends
/// it with an empty value, a `Max-Age` of zero or less, or an `Expires` date
/// that has already passed.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    by_host: HashMap<String, BTreeMap<String, String>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a jar for `host` from a `Cookie` request header
    pub fn from_header(host: &str, header: &str) -> Self {
        let mut jar = Self::new();
        let entries = jar.by_host.entry(host.to_string()).or_default();
        for cookie in Cookie::split_parse(header).flatten() {
            entries.insert(cookie.name().to_string(), cookie.value().to_string());
        }
        jar
    }

    /// Merge raw `Set-Cookie` values received from `host`
    pub fn absorb(&mut self, host: &str, set_cookies: &[String]) {
        if set_cookies.is_empty() {
            return;
        }

        let now = OffsetDateTime::now_utc();
        let jar = self.by_host.entry(host.to_string()).or_default();
        for raw in set_cookies {
            let cookie = match Cookie::parse(raw.as_str()) {
                Ok(cookie) => cookie,
                Err(err) => {
                    debug!(host, error = %err, "Ignoring malformed Set-Cookie");
                    continue;
                }
            };

            let expired = cookie.max_age().is_some_and(|age| age <= CookieDuration::ZERO)
                || cookie.expires_datetime().is_some_and(|at| at <= now);
            if expired || cookie.value().is_empty() {
                jar.remove(cookie.name());
            } else {
                jar.insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
    }

/// Render the `Cookie` header for `host`, if any cookie is stored
    pub fn header_for(&self, host: &str) -> Option<String> {
        let jar = self.by_host.get(host)?;
        if jar.is_empty() {
            return None;
        }
        Some(
            jar.iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn get(&self, host: &str, name: &str) -> Option<&str> {
        self.by_host
            .get(host)
            .and_then(|jar| jar.get(name))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.values().all(BTreeMap::is_empty)
    }
}

/// State carried across the steps of one iteration.
///
/// A session is created per iteration and owned by it; nothing else holds a
/// reference, so no two iterations ever share cookies or identifiers.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    cookies: CookieJar,
    discovered_ids: Vec<String>,
    current_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cookies: CookieJar::new(),
            discovered_ids: Vec::new(),
            current_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    /// Identifiers discovered so far, in first-seen order
    pub fn discovered_ids(&self) -> &[String] {
        &self.discovered_ids
    }

    /// Append identifiers not seen before, keeping discovery order.
    /// Returns how many were new.
    pub fn extend_ids<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.discovered_ids.len();
        for id in ids {
            let id = id.into();
            if !self.discovered_ids.contains(&id) {
                self.discovered_ids.push(id);
            }
        }
        self.discovered_ids.len() - before
    }

    /// Identifier chosen by the most recent `pick_id`
    pub fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    pub fn set_current_id(&mut self, id: impl Into<String>) {
        self.current_id = Some(id.into());
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
