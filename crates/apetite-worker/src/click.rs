//! Notification click routing.
//!
//! A click always dismisses the notification first. The close action stops
//! there; any other click resolves a target URL and either focuses the first
//! open window already showing it or opens a new one.

use std::sync::Arc;

use tracing::debug;

use crate::clients::{ClientInfo, ClientRegistry};
use crate::descriptor::{NotificationData, ACTION_CLOSE};
use crate::error::Result;
use crate::push::{NotificationId, NotificationPresenter};

/// A user click on a shown notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationClick {
    /// The notification that was clicked.
    pub notification: NotificationId,
    /// Action button identifier, or `None` for a click on the body.
    pub action: Option<String>,
    /// Data the notification was shown with.
    pub data: Option<NotificationData>,
}

/// Where a click ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The close action was used; nothing was navigated.
    Dismissed,
    /// An existing window already showing the target was focused.
    Focused(ClientInfo),
    /// A new window was opened at the target.
    Opened(ClientInfo),
    /// No window matched and the host cannot open one.
    NoSurface,
}

impl std::fmt::Display for ClickOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dismissed => write!(f, "dismissed"),
            Self::Focused(client) => write!(f, "focused {}", client.url),
            Self::Opened(client) => write!(f, "opened {}", client.url),
            Self::NoSurface => write!(f, "no surface"),
        }
    }
}

/// Routes notification clicks to page contexts.
pub struct ClickRouter {
    presenter: Arc<dyn NotificationPresenter>,
    registry: ClientRegistry,
    fallback_url: String,
}

impl ClickRouter {
    /// Create a router that falls back to `fallback_url` when a notification
    /// carries no target of its own.
    pub fn new(
        presenter: Arc<dyn NotificationPresenter>,
        registry: ClientRegistry,
        fallback_url: impl Into<String>,
    ) -> Self {
        Self {
            presenter,
            registry,
            fallback_url: fallback_url.into(),
        }
    }

    /// Handle one click.
    ///
    /// The notification is dismissed before anything else happens. The
    /// close action stops there. Otherwise the first window whose URL
    /// contains the target is focused; with no match, a new window is
    /// opened where the host supports it.
    ///
    /// # Errors
    ///
    /// Returns an error if dismissing the notification or driving the
    /// client registry fails.
    pub async fn route(&self, click: &NotificationClick) -> Result<ClickOutcome> {
        self.presenter.close(click.notification).await?;

        if click.action.as_deref() == Some(ACTION_CLOSE) {
            debug!("Notification {} dismissed by close action", click.notification);
            return Ok(ClickOutcome::Dismissed);
        }

        let target = click
            .data
            .as_ref()
            .and_then(|data| data.url.as_deref())
            .unwrap_or(&self.fallback_url);
        debug!(
            "Routing click on notification {} to {}",
            click.notification, target
        );

        // First window already showing the target wins, controlled or not
        for client in self.registry.window_clients()? {
            if client.url.contains(target) {
                if let Some(focused) = self.registry.focus(client.id)? {
                    return Ok(ClickOutcome::Focused(focused));
                }
            }
        }

        match self.registry.open_window(target)? {
            Some(opened) => Ok(ClickOutcome::Opened(opened)),
            None => {
                debug!("No window for {} and host cannot open one", target);
                Ok(ClickOutcome::NoSurface)
            }
        }
    }
}

impl std::fmt::Debug for ClickRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickRouter")
            .field("fallback_url", &self.fallback_url)
            .finish_non_exhaustive()
    }
}
