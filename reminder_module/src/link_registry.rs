//! In-memory registry of one-time linking codes.
//!
//! A code binds an email to whoever sends it back through the chat platform
//! within the TTL. Entries are never persisted; a restart drops them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, warn};

use crate::clock::Clock;

pub const DEFAULT_LINK_TTL_SECS: i64 = 5 * 60;
const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLink {
    pub code: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkRegistryError {
    /// Never issued, already redeemed, or expired. Callers cannot tell which.
    #[error("link code not found or expired")]
    NotFound,
}

pub struct LinkRegistry {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    pending: Mutex<HashMap<String, PendingLink>>,
}

impl LinkRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, Duration::seconds(DEFAULT_LINK_TTL_SECS))
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh code for `email`.
    ///
    /// Codes are random and not checked against in-flight ones: if the same
    /// code is still pending for another request it is replaced (last writer wins).
    pub fn issue(&self, email: &str) -> String {
        let code = rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string();
        self.insert(code.clone(), email);
        code
    }

    pub(crate) fn insert(&self, code: String, email: &str) {
        let expires_at = self.clock.now() + self.ttl;
        let link = PendingLink {
            code: code.clone(),
            email: email.to_string(),
            expires_at,
        };
        if let Some(previous) = self.lock().insert(code.clone(), link) {
            warn!(
                "link code {} reissued before it was redeemed; dropping pending link for {}",
                code, previous.email
            );
        }
        debug!("issued link code for {} (expires {})", email, expires_at);
    }

    /// Consume `code` and return the email it was issued for.
    pub fn redeem(&self, code: &str, now: DateTime<Utc>) -> Result<String, LinkRegistryError> {
        let mut pending = self.lock();
        match pending.remove(code) {
            Some(link) if now < link.expires_at => Ok(link.email),
            Some(link) => {
                debug!("link code for {} redeemed after expiry", link.email);
                Err(LinkRegistryError::NotFound)
            }
            None => Err(LinkRegistryError::NotFound),
        }
    }

    /// Drop every entry whose expiry is strictly before `now`.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, link| link.expires_at >= now);
        before - pending.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    pub fn get(&self, code: &str) -> Option<PendingLink> {
        self.lock().get(code).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingLink>> {
        self.pending
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}
