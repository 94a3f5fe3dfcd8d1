//! Push event handling.
//!
//! Each push event is handled statelessly: resolve the payload into a
//! descriptor, show the notification, then tell every open page to play the
//! alert sound. The broadcast happens strictly after the notification is on
//! screen, so a presenter failure means no page ever hears the sound.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clients::{ClientRegistry, WorkerMessage};
use crate::descriptor::{NotificationAction, NotificationDescriptor};
use crate::error::Result;

/// Identifier of a shown notification.
pub type NotificationId = Uuid;

/// Displays and dismisses notifications on the host platform.
#[async_trait]
pub trait NotificationPresenter: Send + Sync {
    /// Show a notification and return its identifier.
    async fn show(
        &self,
        descriptor: &NotificationDescriptor,
        actions: &[NotificationAction],
    ) -> Result<NotificationId>;

    /// Dismiss a previously shown notification.
    async fn close(&self, id: NotificationId) -> Result<()>;
}

/// Presenter that writes notifications to the log instead of a display.
///
/// Used by the CLI, where there is no notification surface to drive.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPresenter;

#[async_trait]
impl NotificationPresenter for LoggingPresenter {
    async fn show(
        &self,
        descriptor: &NotificationDescriptor,
        actions: &[NotificationAction],
    ) -> Result<NotificationId> {
        let id = Uuid::new_v4();
        info!(
            "Notification {} [{}]: {} / {}",
            id, descriptor.tag, descriptor.title, descriptor.body
        );
        for action in actions {
            debug!("Notification {} action {}: {}", id, action.action, action.title);
        }
        Ok(id)
    }

    async fn close(&self, id: NotificationId) -> Result<()> {
        debug!("Closed notification {}", id);
        Ok(())
    }
}

/// Result of handling one push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// Identifier of the notification that was shown.
    pub notification: NotificationId,
    /// The descriptor that was displayed.
    pub descriptor: NotificationDescriptor,
    /// Number of page contexts that received the audio message.
    pub delivered: usize,
}

/// Turns raw push payloads into notifications and audio messages.
pub struct PushHandler {
    presenter: Arc<dyn NotificationPresenter>,
    registry: ClientRegistry,
}

impl PushHandler {
    /// Create a handler showing notifications through `presenter`.
    pub fn new(presenter: Arc<dyn NotificationPresenter>, registry: ClientRegistry) -> Self {
        Self {
            presenter,
            registry,
        }
    }

    /// Handle one push event.
    ///
    /// The payload may be absent or malformed; either way a notification is
    /// shown, built from the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the presenter fails to show the notification or
    /// the audio broadcast fails.
    pub async fn handle(&self, payload: Option<&[u8]>) -> Result<PushOutcome> {
        let descriptor = NotificationDescriptor::from_push_bytes(payload);
        let actions = NotificationAction::standard();

        let notification = self.presenter.show(&descriptor, &actions).await?;

        let message = WorkerMessage::PlayAudio {
            sound: descriptor.sound.clone(),
        };
        let delivered = self.registry.broadcast(&message).await?;
        debug!(
            "Push handled: notification {} shown, audio sent to {} clients",
            notification, delivered
        );

        Ok(PushOutcome {
            notification,
            descriptor,
            delivered,
        })
    }
}

impl std::fmt::Debug for PushHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushHandler").finish_non_exhaustive()
    }
}
