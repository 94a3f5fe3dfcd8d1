//! Push subscription state.
//!
//! At most one subscription exists per registration. It is created on the
//! first successful registration and handed back unchanged on every later
//! one; nothing in this crate ever destroys it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::storage::Storage;
use crate::vapid;

/// An active push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Endpoint the push service delivers to.
    pub endpoint: String,
    /// base64url application server key the subscription was created with.
    pub server_key: String,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

/// Return the stored subscription, if one exists.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn current_subscription(storage: &Storage) -> Result<Option<PushSubscription>> {
    storage.get_subscription()
}

/// Get the existing subscription or create one with the given server key.
///
/// The endpoint is minted from `endpoint_base` plus a fresh uuid. An
/// existing subscription is returned unchanged, whatever key it was
/// created with.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn ensure_subscription(
    storage: &Storage,
    endpoint_base: &str,
    server_key: &[u8],
) -> Result<PushSubscription> {
    if let Some(existing) = storage.get_subscription()? {
        debug!("Reusing push subscription {}", existing.endpoint);
        return Ok(existing);
    }

    let endpoint = format!("{}/{}", endpoint_base.trim_end_matches('/'), Uuid::new_v4());
    let subscription = PushSubscription {
        endpoint,
        server_key: vapid::encode_server_key(server_key),
        created_at: Utc::now(),
    };
    storage.put_subscription(&subscription)?;
    info!("Created push subscription {}", subscription.endpoint);
    Ok(subscription)
}
