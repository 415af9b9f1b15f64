//! Caller identity resolution.
//!
//! The caller's bearer credential has already been verified by the time it
//! reaches this service; resolving it means finding the provisioned account
//! for the credential's subject.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::UserStore;
use crate::user::User;

/// The verified caller, as presented by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerCredential {
    pub subject: String,
}

impl CallerCredential {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// Map a credential to a provisioned user.
///
/// `Ok(None)` means no credential or no account; both are treated as an
/// authentication failure by the pipeline.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(
        &self,
        credential: Option<&CallerCredential>,
    ) -> std::result::Result<Option<User>, StoreError>;
}

/// Resolves subjects against the user store.
pub struct StoreIdentityResolver {
    users: Arc<dyn UserStore>,
}

impl StoreIdentityResolver {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl IdentityResolver for StoreIdentityResolver {
    async fn resolve(
        &self,
        credential: Option<&CallerCredential>,
    ) -> std::result::Result<Option<User>, StoreError> {
        let Some(credential) = credential else {
            return Ok(None);
        };
        let subject = credential.subject.trim();
        if subject.is_empty() {
            return Ok(None);
        }
        self.users.user_by_subject(subject).await
    }
}
