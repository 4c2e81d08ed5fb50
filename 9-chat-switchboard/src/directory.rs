use std::{collections::HashMap, num::NonZeroUsize, sync::Arc};

use tokio::sync::RwLock;
use tracing::info;

use crate::{config::DEFAULT_MAILBOX_CAPACITY, error::ChatError, session::Session};

/// Registry of connected sessions keyed by username.
///
/// An entry exists exactly while its session is connected. Every mutation
/// happens under the write lock, and a session is closed inside the same
/// critical section that removes it, so readers never see a disconnected
/// session in the map. Locks are always taken directory first, session
/// second.
pub struct Directory {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    mailbox_capacity: NonZeroUsize,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

impl Directory {
    pub fn new(mailbox_capacity: NonZeroUsize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            mailbox_capacity,
        }
    }

    /// Registers `username` and hands back its new session.
    pub async fn connect(&self, username: &str) -> Result<Arc<Session>, ChatError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ChatError::InvalidUsername);
        }

        let mut sessions = self.sessions.write().await;
        if sessions
            .get(username)
            .is_some_and(|existing| existing.is_connected())
        {
            return Err(ChatError::UsernameAlreadyTaken {
                username: username.to_string(),
            });
        }

        let session = Arc::new(Session::new(username.to_string(), self.mailbox_capacity));
        sessions.insert(username.to_string(), Arc::clone(&session));
        info!(username, online = sessions.len(), "session connected");
        Ok(session)
    }

    /// Removes `session` and closes its mailbox.
    ///
    /// Returns `false` when the session is not registered here: already torn
    /// down, replaced by a newer session with the same username, or owned by
    /// another directory. Such sessions are left untouched.
    pub async fn disconnect(&self, session: &Session) -> bool {
        let mut sessions = self.sessions.write().await;
        let registered = sessions
            .get(session.username())
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), session));
        if !registered {
            return false;
        }
        sessions.remove(session.username());

        let closed = session.disconnect();
        if closed {
            info!(
                username = session.username(),
                online = sessions.len(),
                "session disconnected"
            );
        }
        closed
    }

    /// Disconnects every session, returning how many were torn down.
    pub async fn disconnect_all(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions
            .drain()
            .filter(|(_, session)| session.disconnect())
            .count();
        info!(count, "all sessions disconnected");
        count
    }

    pub async fn lookup(&self, username: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(username.trim()).cloned()
    }

    /// Point-in-time copy of the connected sessions.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Sorted usernames of everyone online.
    pub async fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[tokio::test]
    async fn rejects_duplicate_usernames() {
        let directory = Directory::default();
        directory
            .connect("alice")
            .await
            .expect("first connect should pass");
        let result = directory.connect("alice").await;
        assert_eq!(
            result.unwrap_err(),
            ChatError::UsernameAlreadyTaken {
                username: "alice".into()
            }
        );
    }

    #[tokio::test]
    async fn rejects_blank_usernames() {
        let directory = Directory::default();
        assert_eq!(
            directory.connect("   ").await.unwrap_err(),
            ChatError::InvalidUsername
        );
        assert!(directory.is_empty().await);
    }

    #[tokio::test]
    async fn trims_usernames() {
        let directory = Directory::default();
        let session = directory.connect("  bob ").await.expect("connect");
        assert_eq!(session.username(), "bob");
        assert!(directory.lookup("bob").await.is_some());
        assert!(directory.lookup(" bob ").await.is_some());
    }

    #[tokio::test]
    async fn foreign_session_is_left_alone() {
        let home = Directory::default();
        let other = Directory::default();
        let alice = home.connect("alice").await.expect("connect");

        assert!(!other.disconnect(&alice).await);
        assert!(alice.is_connected());
        let found = home.lookup("alice").await.expect("still registered");
        assert!(Arc::ptr_eq(&found, &alice));
        assert_eq!(
            home.connect("alice").await.unwrap_err(),
            ChatError::UsernameAlreadyTaken {
                username: "alice".into()
            }
        );

        assert!(home.disconnect(&alice).await);
        home.connect("alice").await.expect("name is free again");
    }

    #[tokio::test]
    async fn disconnect_removes_entry_and_closes_session() {
        let directory = Directory::default();
        let alice = directory.connect("alice").await.expect("connect");

        assert!(directory.disconnect(&alice).await);
        assert_eq!(alice.state(), SessionState::Disconnected);
        assert!(directory.lookup("alice").await.is_none());

        assert!(!directory.disconnect(&alice).await);
    }

    #[tokio::test]
    async fn stale_disconnect_keeps_newer_session() {
        let directory = Directory::default();
        let old = directory.connect("alice").await.expect("connect");
        directory.disconnect(&old).await;
        let fresh = directory.connect("alice").await.expect("reconnect");

        assert!(!directory.disconnect(&old).await);
        let found = directory.lookup("alice").await.expect("still registered");
        assert!(Arc::ptr_eq(&found, &fresh));
        assert!(fresh.is_connected());
    }

    #[tokio::test]
    async fn snapshot_is_detached_from_later_changes() {
        let directory = Directory::default();
        let alice = directory.connect("alice").await.expect("connect");
        directory.connect("bob").await.expect("connect");

        let snapshot = directory.snapshot().await;
        directory.disconnect(&alice).await;
        directory.connect("carol").await.expect("connect");

        let mut names: Vec<&str> = snapshot.iter().map(|s| s.username()).collect();
        names.sort_unstable();
        assert_eq!(names, ["alice", "bob"]);
        assert_eq!(directory.usernames().await, ["bob", "carol"]);
    }

    #[tokio::test]
    async fn disconnect_all_closes_everyone() {
        let directory = Directory::default();
        let alice = directory.connect("alice").await.expect("connect");
        let bob = directory.connect("bob").await.expect("connect");

        assert_eq!(directory.disconnect_all().await, 2);
        assert!(directory.is_empty().await);
        assert!(!alice.is_connected());
        assert!(!bob.is_connected());
        assert_eq!(directory.len().await, 0);
    }
}
