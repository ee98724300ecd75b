//! Per-store, per-operation authorization.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, IntoStaticStr};

use crate::record::FileRecord;
use crate::{Error, Result};

/// Operations guarded by [`StorePermissions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, IntoStaticStr)]
#[derive(Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Creating a new file.
    Insert,
    /// Reading a file or obtaining a redirect URL.
    Read,
    /// Writing the bytes of a file.
    Write,
    /// Deleting a file.
    Delete,
}

/// Identity of the caller performing an operation.
///
/// An anonymous context is used for token-based access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Authenticated user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Roles held by the caller.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl CallerContext {
    /// Creates an anonymous caller.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Creates an authenticated caller.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            roles: Vec::new(),
        }
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Returns whether the caller is authenticated.
    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Returns whether the caller holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Authorization predicate for one operation.
///
/// Predicates may suspend, e.g. to look up roles in an external service.
/// Plain closures over `(&CallerContext, Option<&FileRecord>)` implement
/// this trait.
#[async_trait]
pub trait Predicate: Send + Sync + 'static {
    /// Returns whether the caller may proceed.
    async fn check(&self, caller: &CallerContext, file: Option<&FileRecord>) -> bool;
}

#[async_trait]
impl<F> Predicate for F
where
    F: Fn(&CallerContext, Option<&FileRecord>) -> bool + Send + Sync + 'static,
{
    async fn check(&self, caller: &CallerContext, file: Option<&FileRecord>) -> bool {
        self(caller, file)
    }
}

/// Allows every caller.
pub fn allow_all() -> impl Predicate {
    |_: &CallerContext, _: Option<&FileRecord>| true
}

/// Denies every caller.
pub fn deny_all() -> impl Predicate {
    |_: &CallerContext, _: Option<&FileRecord>| false
}

/// Allows authenticated callers.
pub fn authenticated() -> impl Predicate {
    |caller: &CallerContext, _: Option<&FileRecord>| caller.is_authenticated()
}

/// Allows the user that created the file. Without a file, any
/// authenticated caller is allowed.
pub fn owner_only() -> impl Predicate {
    |caller: &CallerContext, file: Option<&FileRecord>| match (caller.user_id.as_deref(), file) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(user), Some(file)) => file.user_id.as_deref() == Some(user),
    }
}

/// Allows callers holding `role`.
pub fn require_role(role: impl Into<String>) -> impl Predicate {
    let role = role.into();
    move |caller: &CallerContext, _: Option<&FileRecord>| caller.has_role(&role)
}

/// One predicate per operation; operations without a predicate are allowed.
#[derive(Clone, Default)]
pub struct StorePermissions {
    insert: Option<Arc<dyn Predicate>>,
    read: Option<Arc<dyn Predicate>>,
    write: Option<Arc<dyn Predicate>>,
    delete: Option<Arc<dyn Predicate>>,
}

impl StorePermissions {
    /// Creates permissions allowing every operation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the predicate for `operation`.
    #[must_use]
    pub fn with(mut self, operation: Operation, predicate: impl Predicate) -> Self {
        let predicate: Arc<dyn Predicate> = Arc::new(predicate);
        match operation {
            Operation::Insert => self.insert = Some(predicate),
            Operation::Read => self.read = Some(predicate),
            Operation::Write => self.write = Some(predicate),
            Operation::Delete => self.delete = Some(predicate),
        }
        self
    }

    /// Sets the insert predicate.
    #[must_use]
    pub fn with_insert(self, predicate: impl Predicate) -> Self {
        self.with(Operation::Insert, predicate)
    }

    /// Sets the read predicate.
    #[must_use]
    pub fn with_read(self, predicate: impl Predicate) -> Self {
        self.with(Operation::Read, predicate)
    }

    /// Sets the write predicate.
    #[must_use]
    pub fn with_write(self, predicate: impl Predicate) -> Self {
        self.with(Operation::Write, predicate)
    }

    /// Sets the delete predicate.
    #[must_use]
    pub fn with_delete(self, predicate: impl Predicate) -> Self {
        self.with(Operation::Delete, predicate)
    }

    fn predicate(&self, operation: Operation) -> Option<&Arc<dyn Predicate>> {
        match operation {
            Operation::Insert => self.insert.as_ref(),
            Operation::Read => self.read.as_ref(),
            Operation::Write => self.write.as_ref(),
            Operation::Delete => self.delete.as_ref(),
        }
    }

    /// Evaluates the predicate for `operation`.
    pub async fn check(
        &self,
        operation: Operation,
        caller: &CallerContext,
        file: Option<&FileRecord>,
    ) -> bool {
        match self.predicate(operation) {
            Some(predicate) => predicate.check(caller, file).await,
            None => true,
        }
    }

    /// Evaluates the predicate for `operation`, turning denial into a
    /// permission error.
    pub async fn ensure(
        &self,
        operation: Operation,
        caller: &CallerContext,
        file: Option<&FileRecord>,
    ) -> Result<()> {
        if self.check(operation, caller, file).await {
            return Ok(());
        }

        Err(Error::permission()
            .with_operation(operation.into())
            .with_message(format!("{operation} denied for caller")))
    }
}

impl fmt::Debug for StorePermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorePermissions")
            .field("insert", &self.insert.is_some())
            .field("read", &self.read.is_some())
            .field("write", &self.write.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}
