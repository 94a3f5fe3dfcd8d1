//! Session-scoped visitor identity.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// Visitor identity minted once per shell run.
///
/// Session-scoped only: it is never persisted, so every start of the shell
/// is a fresh visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorSession {
    id: Uuid,
    started_at: DateTime<Utc>,
}

impl VisitorSession {
    /// Mint a new session.
    #[must_use]
    pub fn start() -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        };
        debug!("Visitor session {} started", session.id);
        session
    }

    /// The visitor id for this session.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When this session started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl Default for VisitorSession {
    fn default() -> Self {
        Self::start()
    }
}

impl std::fmt::Display for VisitorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
