//! Worker lifecycle runtime.
//!
//! The worker runs on its own thread with a single-threaded runtime, owning
//! the storage connection outright. Install runs straight into activation
//! with no waiting phase, then events are processed one at a time from a
//! queue. Pages talk to it through a cloneable [`WorkerHandle`]; the loop
//! ends when the last handle is dropped.

use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info};

use crate::cache::CacheManager;
use crate::click::{ClickOutcome, ClickRouter, NotificationClick};
use crate::clients::{ClientInfo, ClientKind, ClientRegistry, WorkerMessage};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{FetchInterceptor, FetchRequest, FetchResponse, HttpFetcher, NetworkFetcher};
use crate::push::{LoggingPresenter, NotificationPresenter, PushHandler, PushOutcome};
use crate::storage::Storage;
use crate::subscription::{current_subscription, ensure_subscription, PushSubscription};

/// Capacity of the worker's event queue.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Filling the current cache from the precache list.
    Installing,
    /// Install finished; activation starts immediately.
    Installed,
    /// Evicting stale caches and claiming clients.
    Activating,
    /// Serving events.
    Activated,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
        }
    }
}

/// Snapshot of the worker and its storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    /// Current lifecycle state.
    pub state: WorkerState,
    /// The cache version being served.
    pub cache_version: String,
    /// Number of cache versions present in storage.
    pub caches: usize,
    /// Number of resources in the current cache.
    pub resources: i64,
    /// Number of connected page contexts.
    pub clients: usize,
    /// Whether a push subscription exists.
    pub has_subscription: bool,
}

enum WorkerEvent {
    Fetch {
        request: FetchRequest,
        respond: oneshot::Sender<Result<FetchResponse>>,
    },
    Push {
        payload: Option<Vec<u8>>,
        respond: oneshot::Sender<Result<PushOutcome>>,
    },
    Click {
        click: NotificationClick,
        respond: oneshot::Sender<Result<ClickOutcome>>,
    },
    Subscription {
        respond: oneshot::Sender<Result<Option<PushSubscription>>>,
    },
    Subscribe {
        server_key: Vec<u8>,
        respond: oneshot::Sender<Result<PushSubscription>>,
    },
    Status {
        respond: oneshot::Sender<Result<WorkerStatus>>,
    },
}

/// The worker runtime, before it is spawned.
pub struct Worker {
    storage: Storage,
    cache: CacheManager,
    interceptor: FetchInterceptor,
    push: PushHandler,
    click: ClickRouter,
    registry: ClientRegistry,
    endpoint_base: String,
}

impl Worker {
    /// Assemble a worker from its parts.
    pub fn new(
        config: &Config,
        storage: Storage,
        fetcher: Arc<dyn NetworkFetcher>,
        presenter: Arc<dyn NotificationPresenter>,
        registry: ClientRegistry,
    ) -> Self {
        let version = config.cache.version.clone();
        let cache = CacheManager::new(&version, config.precache_urls(), fetcher.clone());
        let interceptor = FetchInterceptor::new(&version, fetcher);
        let push = PushHandler::new(presenter.clone(), registry.clone());
        let click = ClickRouter::new(presenter, registry.clone(), &config.push.fallback_url);

        Self {
            storage,
            cache,
            interceptor,
            push,
            click,
            registry,
            endpoint_base: config.push.endpoint_base.clone(),
        }
    }

    /// Assemble a worker with the live fetcher and the logging presenter.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config, storage: Storage) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new()?);
        Ok(Self::new(
            config,
            storage,
            fetcher,
            Arc::new(LoggingPresenter),
            ClientRegistry::new(),
        ))
    }

    /// Start the worker on its own thread.
    ///
    /// Install and activation run to completion before any event is served;
    /// [`WorkerHandle::ready`] resolves once activation is done. The thread
    /// exits when every handle has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or thread cannot be started.
    pub fn spawn(self) -> Result<(WorkerHandle, thread::JoinHandle<()>)> {
        // Storage stays on one thread, so the loop gets its own
        // single-threaded runtime instead of a task on a shared one
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(WorkerState::Installing);

        let handle = WorkerHandle {
            events: event_tx,
            registry: self.registry.clone(),
            state: state_rx,
        };
        let thread = thread::Builder::new()
            .name("apetite-worker".to_string())
            .spawn(move || runtime.block_on(self.run(event_rx, state_tx)))?;

        Ok((handle, thread))
    }

    async fn run(self, mut events: mpsc::Receiver<WorkerEvent>, state: watch::Sender<WorkerState>) {
        if let Err(e) = self.start(&state).await {
            error!("Worker startup failed: {}", e);
            return;
        }

        while let Some(event) = events.recv().await {
            self.handle_event(event, &state).await;
        }
        debug!("Last worker handle dropped, shutting down");
    }

    /// Run install straight into activation.
    async fn start(&self, state: &watch::Sender<WorkerState>) -> Result<()> {
        debug!("Worker installing cache {}", self.cache.version());
        self.cache.install(&self.storage).await?;
        state.send_replace(WorkerState::Installed);

        state.send_replace(WorkerState::Activating);
        let activation = self.cache.activate(&self.storage, &self.registry).await?;
        state.send_replace(WorkerState::Activated);

        info!(
            "Worker activated: cache {} current, {} stale caches evicted",
            self.cache.version(),
            activation.evicted.len()
        );
        Ok(())
    }

    async fn handle_event(&self, event: WorkerEvent, state: &watch::Sender<WorkerState>) {
        match event {
            WorkerEvent::Fetch { request, respond } => {
                let result = self.interceptor.handle(&self.storage, &request).await;
                let _ = respond.send(result);
            }
            WorkerEvent::Push { payload, respond } => {
                let result = self.push.handle(payload.as_deref()).await;
                if let Err(e) = &result {
                    error!("Push event failed: {}", e);
                }
                let _ = respond.send(result);
            }
            WorkerEvent::Click { click, respond } => {
                let result = self.click.route(&click).await;
                if let Err(e) = &result {
                    error!("Notification click failed: {}", e);
                }
                let _ = respond.send(result);
            }
            WorkerEvent::Subscription { respond } => {
                let _ = respond.send(current_subscription(&self.storage));
            }
            WorkerEvent::Subscribe {
                server_key,
                respond,
            } => {
                let result =
                    ensure_subscription(&self.storage, &self.endpoint_base, &server_key);
                let _ = respond.send(result);
            }
            WorkerEvent::Status { respond } => {
                let _ = respond.send(self.status(*state.borrow()));
            }
        }
    }

    fn status(&self, state: WorkerState) -> Result<WorkerStatus> {
        let version = self.cache.version();
        Ok(WorkerStatus {
            state,
            cache_version: version.to_string(),
            caches: self.storage.cache_names()?.len(),
            resources: self.storage.resource_count(version)?,
            clients: self.registry.count()?,
            has_subscription: current_subscription(&self.storage)?.is_some(),
        })
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("cache_version", &self.cache.version())
            .finish_non_exhaustive()
    }
}

/// Cloneable handle for talking to a spawned worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    events: mpsc::Sender<WorkerEvent>,
    registry: ClientRegistry,
    state: watch::Receiver<WorkerState>,
}

impl WorkerHandle {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Wait until install and activation have completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker shut down before activating.
    pub async fn ready(&self) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == WorkerState::Activated)
            .await
            .map_err(|_| Error::WorkerGone)?;
        Ok(())
    }

    /// The client registry the worker serves.
    #[must_use]
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Connect a page context to the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is unavailable.
    pub fn connect(
        &self,
        url: impl Into<String>,
        kind: ClientKind,
        focused: bool,
    ) -> Result<(ClientInfo, mpsc::Receiver<WorkerMessage>)> {
        self.registry.connect(url, kind, focused)
    }

    /// Serve a request cache-first.
    ///
    /// # Errors
    ///
    /// Fails with a lifecycle error until the worker is activated, and
    /// otherwise with whatever the cache lookup or network fetch failed
    /// with.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let current = self.state();
        if current != WorkerState::Activated {
            return Err(Error::lifecycle("serve fetch", current.to_string()));
        }
        self.request(|respond| WorkerEvent::Fetch { request, respond })
            .await
    }

    /// Deliver a push event to the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be shown or the audio
    /// broadcast fails.
    pub async fn push(&self, payload: Option<Vec<u8>>) -> Result<PushOutcome> {
        self.request(|respond| WorkerEvent::Push { payload, respond })
            .await
    }

    /// Deliver a notification click to the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if dismissing the notification or driving the
    /// client registry fails.
    pub async fn click(&self, click: NotificationClick) -> Result<ClickOutcome> {
        self.request(|respond| WorkerEvent::Click { click, respond })
            .await
    }

    /// The stored push subscription, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn subscription(&self) -> Result<Option<PushSubscription>> {
        self.request(|respond| WorkerEvent::Subscription { respond })
            .await
    }

    /// Get or create the push subscription for the given server key.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read or written.
    pub async fn subscribe(&self, server_key: Vec<u8>) -> Result<PushSubscription> {
        self.request(|respond| WorkerEvent::Subscribe {
            server_key,
            respond,
        })
        .await
    }

    /// Snapshot the worker's state and storage.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn status(&self) -> Result<WorkerStatus> {
        self.request(|respond| WorkerEvent::Status { respond }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> WorkerEvent,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(make(tx))
            .await
            .map_err(|_| Error::WorkerGone)?;
        rx.await.map_err(|_| Error::WorkerGone)?
    }
}
