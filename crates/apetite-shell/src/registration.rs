//! Push registration for the page.
//!
//! Registration is feature-gated on the host: without service worker, push
//! manager, and notification support the controller stays inert. With them,
//! it spawns the worker, waits for activation, settles notification
//! permission, gets or creates the push subscription, and wires the audio
//! relay for this page. There is no retry anywhere; every failure degrades
//! to an unsubscribed or unsupported state with a log line.

use std::sync::Arc;
use std::thread;

use apetite_worker::{
    vapid, ClientInfo, ClientKind, Config, PushSubscription, Worker, WorkerHandle,
};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::audio::{relay_audio, AudioSink};

/// Scope the worker is registered for.
pub const WORKER_SCOPE: &str = "/";

/// Worker script path, as the web manifest spells it.
pub const WORKER_SCRIPT: &str = "/sw.js";

/// Host capabilities the registration is gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// The host can run a service worker.
    pub service_worker: bool,
    /// The host exposes a push manager.
    pub push_manager: bool,
    /// The host can show notifications.
    pub notifications: bool,
}

impl HostCapabilities {
    /// A host with everything available.
    #[must_use]
    pub fn full() -> Self {
        Self {
            service_worker: true,
            push_manager: true,
            notifications: true,
        }
    }

    /// Whether push messaging is possible at all.
    #[must_use]
    pub fn supports_push(&self) -> bool {
        self.service_worker && self.push_manager && self.notifications
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::full()
    }
}

/// Notification permission as the host reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    /// The user allowed notifications.
    Granted,
    /// The user blocked notifications.
    Denied,
    /// The user has not decided yet.
    Prompt,
}

impl std::fmt::Display for NotificationPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
            Self::Prompt => write!(f, "prompt"),
        }
    }
}

/// Reads and requests notification permission from the user.
#[async_trait]
pub trait Permissions: Send + Sync {
    /// The current permission state.
    fn status(&self) -> NotificationPermission;

    /// Ask the user and return the resulting state.
    async fn request(&self) -> NotificationPermission;
}

/// Permission provider for hosts with no prompt UI; always granted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

#[async_trait]
impl Permissions for AlwaysGranted {
    fn status(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    async fn request(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }
}

/// Snapshot of the registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationStatus {
    /// Whether the host supports push messaging.
    pub supported: bool,
    /// Whether the worker is registered and activated.
    pub ready: bool,
    /// Notification permission after registration.
    pub permission: NotificationPermission,
    /// Endpoint of the push subscription, if one exists.
    pub endpoint: Option<String>,
}

impl RegistrationStatus {
    /// Status of a host that cannot do push messaging.
    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ready: false,
            permission: NotificationPermission::Prompt,
            endpoint: None,
        }
    }
}

/// Drives worker registration and push subscription for one page.
pub struct PushRegistrationController {
    capabilities: HostCapabilities,
    permissions: Arc<dyn Permissions>,
    sink: Arc<dyn AudioSink>,
    page_url: String,
    permission: NotificationPermission,
    ready: bool,
    handle: Option<WorkerHandle>,
    worker_thread: Option<thread::JoinHandle<()>>,
    relay: Option<tokio::task::JoinHandle<()>>,
    client: Option<ClientInfo>,
    subscription: Option<PushSubscription>,
}

impl PushRegistrationController {
    /// Create a controller for the page at `page_url`.
    pub fn new(
        capabilities: HostCapabilities,
        permissions: Arc<dyn Permissions>,
        sink: Arc<dyn AudioSink>,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            capabilities,
            permissions,
            sink,
            page_url: page_url.into(),
            permission: NotificationPermission::Prompt,
            ready: false,
            handle: None,
            worker_thread: None,
            relay: None,
            client: None,
            subscription: None,
        }
    }

    /// Register the worker and set up push for this page.
    ///
    /// On unsupported hosts nothing happens. Registering twice is a no-op
    /// returning the current status; the given worker is dropped unspawned.
    pub async fn register(&mut self, config: &Config, worker: Worker) -> RegistrationStatus {
        if !self.capabilities.supports_push() {
            info!("Push messaging not supported on this host");
            return RegistrationStatus::unsupported();
        }
        if self.handle.is_some() {
            debug!("Worker already registered");
            return self.status();
        }

        info!("Registering {} at scope {}", WORKER_SCRIPT, WORKER_SCOPE);
        let (handle, worker_thread) = match worker.spawn() {
            Ok(spawned) => spawned,
            Err(e) => {
                warn!("Worker registration failed: {}", e);
                return self.status();
            }
        };
        self.worker_thread = Some(worker_thread);

        if let Err(e) = handle.ready().await {
            warn!("Worker never became ready: {}", e);
            self.handle = Some(handle);
            return self.status();
        }
        self.ready = true;

        // This page becomes a client and relays audio commands to its sink
        match handle.connect(&self.page_url, ClientKind::Window, true) {
            Ok((client, receiver)) => {
                self.client = Some(client);
                self.relay = Some(tokio::spawn(relay_audio(receiver, self.sink.clone())));
            }
            Err(e) => warn!("Failed to connect page to worker: {}", e),
        }
        self.handle = Some(handle);

        self.permission = self.permissions.status();
        if self.permission == NotificationPermission::Prompt {
            self.permission = self.permissions.request().await;
            debug!("Notification permission now {}", self.permission);
        }
        if self.permission != NotificationPermission::Granted {
            info!(
                "Notifications {}, staying registered without a subscription",
                self.permission
            );
            return self.status();
        }

        match vapid::decode_server_key(&config.push.vapid_public_key) {
            Ok(server_key) => {
                if let Some(handle) = &self.handle {
                    match handle.subscribe(server_key).await {
                        Ok(subscription) => {
                            info!("Push subscription ready at {}", subscription.endpoint);
                            self.subscription = Some(subscription);
                        }
                        Err(e) => warn!("Push subscription failed: {}", e),
                    }
                }
            }
            Err(e) => warn!("Configured server key is unusable: {}", e),
        }

        self.status()
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> RegistrationStatus {
        if !self.capabilities.supports_push() {
            return RegistrationStatus::unsupported();
        }
        RegistrationStatus {
            supported: true,
            ready: self.ready,
            permission: self.permission,
            endpoint: self
                .subscription
                .as_ref()
                .map(|subscription| subscription.endpoint.clone()),
        }
    }

    /// Handle to the registered worker, once registered.
    #[must_use]
    pub fn handle(&self) -> Option<&WorkerHandle> {
        self.handle.as_ref()
    }

    /// This page's client identity, once connected.
    #[must_use]
    pub fn client(&self) -> Option<&ClientInfo> {
        self.client.as_ref()
    }

    /// The push subscription, if one was established.
    #[must_use]
    pub fn subscription(&self) -> Option<&PushSubscription> {
        self.subscription.as_ref()
    }

    /// Drop the registration and wait for the worker to wind down.
    ///
    /// Blocks briefly while the worker thread drains and exits.
    pub fn shutdown(mut self) {
        self.relay.take();
        self.handle.take();
        if let Some(worker_thread) = self.worker_thread.take() {
            if worker_thread.join().is_err() {
                warn!("Worker thread ended with a panic");
            }
        }
        debug!("Registration shut down");
    }
}

impl std::fmt::Debug for PushRegistrationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRegistrationController")
            .field("capabilities", &self.capabilities)
            .field("page_url", &self.page_url)
            .field("permission", &self.permission)
            .field("ready", &self.ready)
            .field("has_subscription", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}
