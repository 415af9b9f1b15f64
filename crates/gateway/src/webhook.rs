//! Identity-provider webhook.
//!
//! Keeps the user table in step with the identity provider:
//! `user.created` provisions, `user.updated` patches, `user.deleted`
//! cascades. Other event types are acknowledged and ignored.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::{error, info, warn};

use hikewise_core::ExternalProfile;
use hikewise_security::SignedHeaders;

use crate::SharedState;

type Reply = (StatusCode, &'static str);

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    primary_email_address_id: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    #[serde(default)]
    id: Option<String>,
    email_address: String,
}

impl UserData {
    /// The primary address, else the first one listed.
    fn email(&self) -> Option<&str> {
        let primary = self.primary_email_address_id.as_deref().and_then(|primary| {
            self.email_addresses
                .iter()
                .find(|e| e.id.as_deref() == Some(primary))
        });
        primary
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.as_str())
    }

    fn into_profile(self) -> ExternalProfile {
        let email = self.email().map(String::from);
        let full_name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        ExternalProfile {
            subject: self.id,
            email,
            username: self.username,
            full_name: (!full_name.is_empty()).then_some(full_name),
            first_name: self.first_name,
            last_name: self.last_name,
            avatar_url: self.image_url,
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub(crate) async fn identity_webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    if let Some(verifier) = &state.verifier {
        let signed = SignedHeaders {
            id: header(&headers, "svix-id"),
            timestamp: header(&headers, "svix-timestamp"),
            signature: header(&headers, "svix-signature"),
        };
        if let Err(e) = verifier.verify(signed, &body, state.clock.now()) {
            warn!("Rejected identity webhook: {e}");
            return (StatusCode::UNAUTHORIZED, "Invalid signature");
        }
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid JSON"),
    };

    info!(event = %event.kind, "Identity webhook received");

    match event.kind.as_str() {
        "user.created" | "user.updated" | "user.deleted" => {}
        other => {
            info!(event = %other, "Ignoring unhandled identity event");
            return (StatusCode::OK, "OK");
        }
    }

    let data: UserData = match serde_json::from_value(event.data) {
        Ok(data) => data,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid user payload"),
    };
    let profile = data.into_profile();
    let subject = profile.subject.clone();

    let outcome = match event.kind.as_str() {
        "user.created" => {
            if profile.email.is_none() {
                error!(subject = %subject, "No email on created user");
                return (StatusCode::BAD_REQUEST, "No email");
            }
            state.users.create_user(&profile).await.map(|user| {
                info!(subject = %subject, user = %user.id, "User provisioned");
            })
        }
        "user.updated" => state.users.update_user(&profile).await.map(|updated| {
            if updated.is_some() {
                info!(subject = %subject, "User updated");
            } else {
                warn!(subject = %subject, "Update for unknown user");
            }
        }),
        _ => state.users.delete_user(&subject).await.map(|existed| {
            info!(subject = %subject, existed, "User deleted");
        }),
    };

    match outcome {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            error!(subject = %subject, event = %event.kind, "Identity sync failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
        }
    }
}
