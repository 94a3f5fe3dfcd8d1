//! Notification descriptor types and push payload merging.
//!
//! Every displayed notification starts from the fixed house defaults below.
//! An inbound push payload can override fields, but a payload that fails to
//! parse is dropped whole so a garbled push still produces the stock
//! notification instead of a half-merged one.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Identifier of the action button that opens the target URL.
pub const ACTION_VIEW: &str = "view";

/// Identifier of the action button that dismisses the notification.
pub const ACTION_CLOSE: &str = "close";

const DEFAULT_TITLE: &str = "Meu Apetite";
const DEFAULT_BODY: &str = "Você tem uma nova notificação!";
const DEFAULT_IMAGE: &str = "/images/logo512.png";
const DEFAULT_ICON: &str = "/images/logo192.png";
const DEFAULT_BADGE: &str = "/images/badge72.png";
const DEFAULT_SOUND: &str = "/audio/notification.mp3";
const DEFAULT_TAG: &str = "meu-apetite-notification";
const DEFAULT_URL: &str = "/orders";

/// Data attached to a notification, read back when it is clicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Target URL opened when the notification body or view action is clicked.
    pub url: Option<String>,
}

impl Default for NotificationData {
    fn default() -> Self {
        Self {
            url: Some(DEFAULT_URL.to_string()),
        }
    }
}

/// A fully resolved notification, ready to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDescriptor {
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Large image shown in the expanded notification.
    pub image: String,
    /// Icon shown next to the text.
    pub icon: String,
    /// Monochrome badge for status bars.
    pub badge: String,
    /// Path of the alert sound relayed to open pages.
    pub sound: String,
    /// Keep the notification on screen until the user acts on it.
    pub require_interaction: bool,
    /// Vibration pattern in milliseconds.
    pub vibrate: Vec<u32>,
    /// Tag collapsing notifications that share it.
    pub tag: String,
    /// Click-time data.
    pub data: NotificationData,
}

impl Default for NotificationDescriptor {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: DEFAULT_BODY.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_BADGE.to_string(),
            sound: DEFAULT_SOUND.to_string(),
            require_interaction: true,
            vibrate: vec![200, 100, 200],
            tag: DEFAULT_TAG.to_string(),
            data: NotificationData::default(),
        }
    }
}

/// Inbound push payload with every field optional.
///
/// Unknown fields are ignored so the wire format can grow ahead of this
/// struct without breaking older workers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    /// Overrides the default title.
    pub title: Option<String>,
    /// Overrides the default body.
    pub body: Option<String>,
    /// Overrides the default image.
    pub image: Option<String>,
    /// Overrides the default icon.
    pub icon: Option<String>,
    /// Overrides the default badge.
    pub badge: Option<String>,
    /// Overrides the default sound unless empty.
    pub sound: Option<String>,
    /// Overrides the default interaction requirement.
    pub require_interaction: Option<bool>,
    /// Overrides the default vibration pattern.
    pub vibrate: Option<Vec<u32>>,
    /// Overrides the default tag.
    pub tag: Option<String>,
    /// Replaces the default click-time data wholesale.
    pub data: Option<PushPayloadData>,
}

/// Click-time data carried by a push payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayloadData {
    /// Target URL for the click router.
    pub url: Option<String>,
}

impl NotificationDescriptor {
    /// Overlay a parsed payload on the defaults.
    ///
    /// Every present field replaces its default. `sound` is the exception:
    /// an empty string keeps the default so a notification is never silent
    /// by accident. A present `data` object replaces the default data as a
    /// whole, even when it carries no URL.
    #[must_use]
    pub fn from_payload(payload: PushPayload) -> Self {
        let mut descriptor = Self::default();
        if let Some(title) = payload.title {
            descriptor.title = title;
        }
        if let Some(body) = payload.body {
            descriptor.body = body;
        }
        if let Some(image) = payload.image {
            descriptor.image = image;
        }
        if let Some(icon) = payload.icon {
            descriptor.icon = icon;
        }
        if let Some(badge) = payload.badge {
            descriptor.badge = badge;
        }
        if let Some(sound) = payload.sound {
            if !sound.is_empty() {
                descriptor.sound = sound;
            }
        }
        if let Some(require_interaction) = payload.require_interaction {
            descriptor.require_interaction = require_interaction;
        }
        if let Some(vibrate) = payload.vibrate {
            descriptor.vibrate = vibrate;
        }
        if let Some(tag) = payload.tag {
            descriptor.tag = tag;
        }
        if let Some(data) = payload.data {
            descriptor.data = NotificationData { url: data.url };
        }
        descriptor
    }

    /// Resolve a raw push payload into a descriptor.
    ///
    /// `None` (a push without a payload) and malformed JSON both yield the
    /// full default set. A parse failure is logged and the payload dropped
    /// entirely, never merged partially.
    #[must_use]
    pub fn from_push_bytes(bytes: Option<&[u8]>) -> Self {
        match bytes {
            None => Self::default(),
            Some(raw) => match serde_json::from_slice::<PushPayload>(raw) {
                Ok(payload) => Self::from_payload(payload),
                Err(err) => {
                    warn!(error = %err, "push payload is not valid JSON, showing default notification");
                    Self::default()
                }
            },
        }
    }

    /// Target URL for a click on this notification, if it carries one.
    #[must_use]
    pub fn target_url(&self) -> Option<&str> {
        self.data.url.as_deref()
    }
}

/// A labeled button rendered on the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    /// Identifier reported back on click.
    pub action: String,
    /// Button label.
    pub title: String,
}

impl NotificationAction {
    /// The fixed action row shown on every notification.
    #[must_use]
    pub fn standard() -> Vec<Self> {
        vec![
            Self {
                action: ACTION_VIEW.to_string(),
                title: "Ver detalhes".to_string(),
            },
            Self {
                action: ACTION_CLOSE.to_string(),
                title: "Fechar".to_string(),
            },
        ]
    }
}
