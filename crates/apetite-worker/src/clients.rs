//! Connected page contexts and the worker-to-page message protocol.
//!
//! The worker is the only writer of this registry. Pages connect to receive
//! [`WorkerMessage`]s and can be enumerated, focused, claimed, or opened by
//! the worker while it handles events.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Identifier of a connected page context.
pub type ClientId = Uuid;

/// Capacity of each client's message channel.
const CHANNEL_CAPACITY: usize = 16;

/// The kind of execution context a client is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// A browsing context with a visible window or tab.
    Window,
    /// A non-window context such as a shared or dedicated worker.
    Worker,
}

impl std::fmt::Display for ClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Window => write!(f, "window"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

/// A connected page context as the worker sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Identifier assigned at connection time.
    pub id: ClientId,
    /// URL the context is showing.
    pub url: String,
    /// What kind of context this is.
    pub kind: ClientKind,
    /// Whether the context currently holds focus.
    pub focused: bool,
    /// Whether the worker controls this context.
    pub controlled: bool,
}

/// Message posted from the worker to page contexts.
///
/// Serialized with an `action` tag so the protocol can grow more commands
/// without breaking existing pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum WorkerMessage {
    /// Ask the page to play an alert sound.
    PlayAudio {
        /// Path of the sound to play.
        sound: String,
    },
}

#[derive(Debug)]
struct ClientEntry {
    info: ClientInfo,
    /// `None` for windows the worker opened itself: they are enumerable but
    /// have no message pipe until their page connects one.
    sender: Option<mpsc::Sender<WorkerMessage>>,
}

/// Registry of connected page contexts.
///
/// Cheap to clone; all clones share the same state.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    state: Arc<RwLock<Vec<ClientEntry>>>,
    supports_open_window: bool,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    /// Create a registry on a host that can open new windows.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(Vec::new())),
            supports_open_window: true,
        }
    }

    /// Create a registry on a host without window-opening support.
    #[must_use]
    pub fn without_open_window() -> Self {
        Self {
            state: Arc::new(RwLock::new(Vec::new())),
            supports_open_window: false,
        }
    }

    /// Whether this host can open new windows.
    #[must_use]
    pub fn supports_open_window(&self) -> bool {
        self.supports_open_window
    }

    /// Connect a new page context.
    ///
    /// Returns the client's identity and the receiving end of its message
    /// channel. New clients start uncontrolled; activation claims them.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn connect(
        &self,
        url: impl Into<String>,
        kind: ClientKind,
        focused: bool,
    ) -> Result<(ClientInfo, mpsc::Receiver<WorkerMessage>)> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let info = ClientInfo {
            id: Uuid::new_v4(),
            url: url.into(),
            kind,
            focused,
            controlled: false,
        };

        let mut state = self.write_state()?;
        debug!("Client {} connected at {}", info.id, info.url);
        state.push(ClientEntry {
            info: info.clone(),
            sender: Some(tx),
        });
        Ok((info, rx))
    }

    /// Remove a client from the registry.
    ///
    /// Returns `true` if the client was connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn disconnect(&self, id: ClientId) -> Result<bool> {
        let mut state = self.write_state()?;
        let before = state.len();
        state.retain(|entry| entry.info.id != id);
        Ok(state.len() < before)
    }

    /// Look up a client by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn get(&self, id: ClientId) -> Result<Option<ClientInfo>> {
        let state = self.read_state()?;
        Ok(state
            .iter()
            .find(|entry| entry.info.id == id)
            .map(|entry| entry.info.clone()))
    }

    /// All connected clients in connection order.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn clients(&self) -> Result<Vec<ClientInfo>> {
        let state = self.read_state()?;
        Ok(state.iter().map(|entry| entry.info.clone()).collect())
    }

    /// Window clients in connection order, uncontrolled ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn window_clients(&self) -> Result<Vec<ClientInfo>> {
        let state = self.read_state()?;
        Ok(state
            .iter()
            .filter(|entry| entry.info.kind == ClientKind::Window)
            .map(|entry| entry.info.clone())
            .collect())
    }

    /// Number of connected clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn count(&self) -> Result<usize> {
        Ok(self.read_state()?.len())
    }

    /// Post a message to every connected client.
    ///
    /// Clients whose page has gone away are pruned. Returns the number of
    /// clients the message was delivered to.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub async fn broadcast(&self, message: &WorkerMessage) -> Result<usize> {
        // Collect senders first so no lock is held across an await
        let targets: Vec<(ClientId, mpsc::Sender<WorkerMessage>)> = {
            let state = self.read_state()?;
            state
                .iter()
                .filter_map(|entry| {
                    entry
                        .sender
                        .clone()
                        .map(|sender| (entry.info.id, sender))
                })
                .collect()
        };

        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, sender) in targets {
            if sender.send(message.clone()).await.is_ok() {
                delivered += 1;
            } else {
                debug!("Client {} is gone, pruning", id);
                gone.push(id);
            }
        }

        if !gone.is_empty() {
            let mut state = self.write_state()?;
            state.retain(|entry| !gone.contains(&entry.info.id));
        }

        Ok(delivered)
    }

    /// Give focus to the client with the given id, taking it from the rest.
    ///
    /// Returns the focused client, or `None` if the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn focus(&self, id: ClientId) -> Result<Option<ClientInfo>> {
        let mut state = self.write_state()?;
        if !state.iter().any(|entry| entry.info.id == id) {
            return Ok(None);
        }

        let mut focused = None;
        for entry in state.iter_mut() {
            entry.info.focused = entry.info.id == id;
            if entry.info.focused {
                focused = Some(entry.info.clone());
            }
        }
        Ok(focused)
    }

    /// Open a new window at the given URL, if the host supports it.
    ///
    /// The new client is focused and controlled but has no message pipe
    /// until its page connects one. Returns `None` on hosts without
    /// window-opening support.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn open_window(&self, url: impl Into<String>) -> Result<Option<ClientInfo>> {
        if !self.supports_open_window {
            return Ok(None);
        }

        let info = ClientInfo {
            id: Uuid::new_v4(),
            url: url.into(),
            kind: ClientKind::Window,
            focused: true,
            controlled: true,
        };

        let mut state = self.write_state()?;
        for entry in state.iter_mut() {
            entry.info.focused = false;
        }
        debug!("Opened window {} at {}", info.id, info.url);
        state.push(ClientEntry {
            info: info.clone(),
            sender: None,
        });
        Ok(Some(info))
    }

    /// Take control of every connected client.
    ///
    /// Returns the number of clients that were newly claimed.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn claim_all(&self) -> Result<usize> {
        let mut state = self.write_state()?;
        let mut claimed = 0;
        for entry in state.iter_mut() {
            if !entry.info.controlled {
                entry.info.controlled = true;
                claimed += 1;
            }
        }
        Ok(claimed)
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<ClientEntry>>> {
        self.state
            .read()
            .map_err(|_| Error::internal("client registry lock poisoned"))
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<ClientEntry>>> {
        self.state
            .write()
            .map_err(|_| Error::internal("client registry lock poisoned"))
    }
}
