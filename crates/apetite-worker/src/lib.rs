//! `apetite-worker` - Offline cache and push notification runtime for Meu Apetite
//!
//! This library provides the service-worker side of the ordering platform: a
//! versioned offline cache with cache-first request serving, push notification
//! handling, notification click routing, the connected-page registry, push
//! subscription state, and the worker lifecycle runtime that ties them together.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cache;
pub mod click;
pub mod clients;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod push;
pub mod resource;
pub mod storage;
pub mod subscription;
pub mod vapid;
pub mod worker;

pub use click::{ClickOutcome, NotificationClick};
pub use clients::{ClientId, ClientInfo, ClientKind, ClientRegistry, WorkerMessage};
pub use config::Config;
pub use descriptor::{NotificationAction, NotificationDescriptor, PushPayload};
pub use error::{Error, Result};
pub use fetch::{FetchRequest, FetchResponse, HttpFetcher, NetworkFetcher, ResponseSource};
pub use logging::init_logging;
pub use push::{NotificationId, NotificationPresenter, PushOutcome};
pub use resource::CachedResource;
pub use storage::{Storage, StorageStats};
pub use subscription::PushSubscription;
pub use worker::{Worker, WorkerHandle, WorkerState, WorkerStatus};
