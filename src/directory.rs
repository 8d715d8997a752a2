//! # Directory: who is reachable, and how.
//!
//! The [`Directory`] maps agent names to their mailboxes and kinds. Actors use
//! it to discover each other and to deliver [`Envelope`]s:
//!
//! - the coordinator discovers all workers at the start of every round;
//! - a route is delivered to its worker by exact name, or by the first name
//!   that starts with `<name>-` (workers may register with a suffix);
//! - a worker finds the coordinator to report arrivals.
//!
//! Delivery never waits: a full or closed mailbox is reported back to the
//! sender, which logs it and moves on.
//!
//! ```text
//! register(name, kind, tx) ──► RwLock<BTreeMap<name, Entry{kind, tx}>>
//!                                   │
//!   discover(kind) ◄────────────────┤  (names in sorted order)
//!   resolve(name)  ◄────────────────┤  exact, then prefix "name-"
//!   send(to, env)  ◄────────────────┘  try_send, never blocks
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use crate::error::DirectoryError;
use crate::protocol::Envelope;

/// Sending half of an actor mailbox.
pub type Mailbox = mpsc::Sender<Envelope>;

/// Role an agent registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Coordinator,
    Worker,
}

struct Entry {
    kind: AgentKind,
    mailbox: Mailbox,
}

/// Shared name service. Cheap to clone.
#[derive(Clone, Default)]
pub struct Directory {
    entries: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`. Names are unique across kinds.
    pub async fn register(
        &self,
        name: impl Into<String>,
        kind: AgentKind,
        mailbox: Mailbox,
    ) -> Result<(), DirectoryError> {
        let name = name.into();
        let mut entries = self.entries.write().await;
        if entries.contains_key(&name) {
            return Err(DirectoryError::DuplicateName { name });
        }
        entries.insert(name, Entry { kind, mailbox });
        Ok(())
    }

    /// Removes `name`; returns whether it was registered.
    pub async fn deregister(&self, name: &str) -> bool {
        self.entries.write().await.remove(name).is_some()
    }

    /// Names registered under `kind`, sorted.
    pub async fn discover(&self, kind: AgentKind) -> Vec<String> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.kind == kind)
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Resolves a planned worker name to a registered one.
    ///
    /// Exact match first; otherwise the first registered worker whose name starts
    /// with `<name>-`.
    pub async fn resolve(&self, name: &str) -> Option<String> {
        let entries = self.entries.read().await;
        if entries.contains_key(name) {
            return Some(name.to_string());
        }
        let prefix = format!("{name}-");
        entries
            .iter()
            .find(|(n, e)| e.kind == AgentKind::Worker && n.starts_with(&prefix))
            .map(|(n, _)| n.clone())
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    /// Delivers `envelope` to `to` without waiting.
    pub async fn send(&self, to: &str, envelope: Envelope) -> Result<(), DirectoryError> {
        let entries = self.entries.read().await;
        let entry = entries.get(to).ok_or_else(|| DirectoryError::NotFound {
            name: to.to_string(),
        })?;
        entry.mailbox.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DirectoryError::MailboxFull {
                name: to.to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => DirectoryError::MailboxClosed {
                name: to.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Content, ConversationId};

    fn mailbox() -> (Mailbox, mpsc::Receiver<Envelope>) {
        mpsc::channel(1)
    }

    #[tokio::test]
    async fn names_are_unique() {
        let dir = Directory::new();
        let (tx, _rx) = mailbox();
        dir.register("truck-1", AgentKind::Worker, tx.clone()).await.unwrap();
        let err = dir.register("truck-1", AgentKind::Coordinator, tx).await.unwrap_err();
        assert_eq!(err.as_label(), "directory_duplicate_name");
    }

    #[tokio::test]
    async fn discover_filters_by_kind() {
        let dir = Directory::new();
        let (tx, _rx) = mailbox();
        dir.register("coordinator", AgentKind::Coordinator, tx.clone()).await.unwrap();
        dir.register("van-b", AgentKind::Worker, tx.clone()).await.unwrap();
        dir.register("van-a", AgentKind::Worker, tx).await.unwrap();

        assert_eq!(dir.discover(AgentKind::Worker).await, vec!["van-a", "van-b"]);
        assert_eq!(dir.discover(AgentKind::Coordinator).await, vec!["coordinator"]);

        assert!(dir.deregister("van-a").await);
        assert!(!dir.deregister("van-a").await);
        assert_eq!(dir.discover(AgentKind::Worker).await, vec!["van-b"]);
    }

    #[tokio::test]
    async fn resolve_prefers_exact_then_suffixed() {
        let dir = Directory::new();
        let (tx, _rx) = mailbox();
        dir.register("truck-7", AgentKind::Worker, tx.clone()).await.unwrap();
        dir.register("van", AgentKind::Worker, tx).await.unwrap();

        assert_eq!(dir.resolve("van").await.as_deref(), Some("van"));
        assert_eq!(dir.resolve("truck").await.as_deref(), Some("truck-7"));
        assert_eq!(dir.resolve("tru").await, None);
    }

    #[tokio::test]
    async fn send_reports_full_and_missing_mailboxes() {
        let dir = Directory::new();
        let (tx, mut rx) = mailbox();
        dir.register("w", AgentKind::Worker, tx).await.unwrap();

        let env = Envelope::new("c", ConversationId(1), &Content::QueryCapability).unwrap();
        dir.send("w", env.clone()).await.unwrap();
        let err = dir.send("w", env.clone()).await.unwrap_err();
        assert_eq!(err, DirectoryError::MailboxFull { name: "w".into() });
        assert_eq!(rx.recv().await.unwrap(), env);

        drop(rx);
        let err = dir.send("w", env.clone()).await.unwrap_err();
        assert_eq!(err.as_label(), "directory_mailbox_closed");

        let err = dir.send("nobody", env).await.unwrap_err();
        assert_eq!(err.as_label(), "directory_not_found");
    }
}
