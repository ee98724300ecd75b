//! Short-lived access tokens for delegated file retrieval.

use std::collections::HashMap;
use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::TRACING_TARGET_TOKENS;
use crate::record::FileId;

/// Constraints attached to an issued token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConstraints {
    /// Whether the token is consumed by its first successful validation.
    pub single_use: bool,
    /// Absolute expiry; the store default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl TokenConstraints {
    /// Reusable token with the default lifetime.
    pub fn reusable() -> Self {
        Self::default()
    }

    /// Single-use token with the default lifetime.
    pub fn single_use() -> Self {
        Self {
            single_use: true,
            expires_at: None,
        }
    }

    /// Expires `ttl` from now.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expires_at = Some(expiry_after(ttl));
        self
    }

    /// Expires at `expires_at`.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// An issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque token string handed to the client.
    pub token: String,
    /// File the token grants access to.
    pub file_id: FileId,
    /// Whether the token is consumed on first use.
    pub single_use: bool,
    /// When the token was issued.
    pub issued_at: Timestamp,
    /// When the token stops validating.
    pub expires_at: Timestamp,
}

impl AccessToken {
    /// Returns whether the token has expired.
    pub fn is_expired(&self) -> bool {
        Timestamp::now() >= self.expires_at
    }
}

#[derive(Debug, Clone)]
struct TokenEntry {
    file_id: FileId,
    single_use: bool,
    expires_at: Timestamp,
}

/// Table of issued tokens.
///
/// Validation and consumption happen under one lock, so a single-use token
/// validated concurrently succeeds exactly once.
#[derive(Debug)]
pub struct Tokens {
    entries: Mutex<HashMap<String, TokenEntry>>,
    default_ttl: Duration,
}

impl Tokens {
    /// Creates an empty table whose tokens expire after `default_ttl` unless
    /// constrained otherwise.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Returns the default token lifetime.
    #[inline]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issues a token for `file_id`.
    pub async fn issue(&self, file_id: &FileId, constraints: TokenConstraints) -> AccessToken {
        let issued_at = Timestamp::now();
        let expires_at = constraints
            .expires_at
            .unwrap_or_else(|| expiry_after(self.default_ttl));
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        let entry = TokenEntry {
            file_id: file_id.clone(),
            single_use: constraints.single_use,
            expires_at,
        };
        self.entries.lock().await.insert(token.clone(), entry);

        tracing::debug!(
            target: TRACING_TARGET_TOKENS,
            file_id = %file_id,
            single_use = constraints.single_use,
            expires_at = %expires_at,
            "Issued access token"
        );

        AccessToken {
            token,
            file_id: file_id.clone(),
            single_use: constraints.single_use,
            issued_at,
            expires_at,
        }
    }

    /// Validates a token, consuming it if single-use.
    ///
    /// Returns the bound file id, or `None` for unknown, expired or already
    /// consumed tokens.
    pub async fn validate(&self, token: &str) -> Option<FileId> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(token)?;

        if Timestamp::now() >= entry.expires_at {
            entries.remove(token);
            tracing::debug!(target: TRACING_TARGET_TOKENS, "Rejected expired access token");
            return None;
        }

        if entry.single_use {
            let entry = entries.remove(token)?;
            tracing::debug!(
                target: TRACING_TARGET_TOKENS,
                file_id = %entry.file_id,
                "Consumed single-use access token"
            );
            return Some(entry.file_id);
        }

        Some(entry.file_id.clone())
    }

    /// Validates a token against a specific file.
    ///
    /// A single-use token presented for the wrong file is not consumed.
    pub async fn validate_for(&self, token: &str, file_id: &FileId) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get(token) else {
            return false;
        };

        if Timestamp::now() >= entry.expires_at {
            entries.remove(token);
            return false;
        }

        if &entry.file_id != file_id {
            return false;
        }

        if entry.single_use {
            entries.remove(token);
        }

        true
    }

    /// Revokes a token. Returns whether it existed.
    pub async fn revoke(&self, token: &str) -> bool {
        self.entries.lock().await.remove(token).is_some()
    }

    /// Revokes every token bound to `file_id`. Returns how many were removed.
    pub async fn revoke_file(&self, file_id: &FileId) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| &entry.file_id != file_id);
        before - entries.len()
    }

    /// Drops expired tokens. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Timestamp::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);

        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(target: TRACING_TARGET_TOKENS, purged, "Purged expired access tokens");
        }
        purged
    }

    /// Returns the number of live entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns whether no tokens are held.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

fn expiry_after(ttl: Duration) -> Timestamp {
    let ttl = SignedDuration::try_from(ttl).unwrap_or(SignedDuration::MAX);
    Timestamp::now()
        .checked_add(ttl)
        .unwrap_or(Timestamp::MAX)
}
