use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::{
    config::ChatConfig,
    directory::Directory,
    error::ChatError,
    message::Message,
    session::{Delivery, Session},
};

/// Outcome of a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub queued: usize,
    pub dropped: usize,
}

/// Delivery logic on top of a [`Directory`].
///
/// The router owns no sessions. It resolves recipients through the
/// directory and hands messages to each session's mailbox.
#[derive(Clone)]
pub struct Router {
    directory: Arc<Directory>,
    echo_to_sender: bool,
}

impl Router {
    pub fn new(directory: Arc<Directory>, config: &ChatConfig) -> Self {
        Self {
            directory,
            echo_to_sender: config.echo_to_sender,
        }
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Sends `body` to everyone connected when the snapshot is taken.
    ///
    /// The registry lock is released before any mailbox is touched.
    pub async fn broadcast(
        &self,
        sender: &Session,
        body: impl Into<String>,
    ) -> Result<BroadcastReport, ChatError> {
        ensure_connected(sender)?;

        let message = Message::broadcast(sender.username(), body);
        let recipients = self.directory.snapshot().await;

        let mut report = BroadcastReport::default();
        for recipient in recipients
            .iter()
            .filter(|recipient| self.echo_to_sender || recipient.username() != sender.username())
        {
            report.recipients += 1;
            match recipient.send(message.clone()) {
                Delivery::Queued => report.queued += 1,
                Delivery::MailboxFull | Delivery::Closed => report.dropped += 1,
            }
        }

        debug!(
            from = sender.username(),
            recipients = report.recipients,
            dropped = report.dropped,
            "broadcast delivered"
        );
        Ok(report)
    }

    /// Sends `body` to a single named recipient.
    pub async fn private_message(
        &self,
        sender: &Session,
        recipient: &str,
        body: impl Into<String>,
    ) -> Result<Delivery, ChatError> {
        ensure_connected(sender)?;

        let target = self
            .directory
            .lookup(recipient)
            .await
            .ok_or_else(|| ChatError::RecipientNotFound {
                username: recipient.to_string(),
            })?;

        Ok(target.send(Message::private(sender.username(), body)))
    }
}

fn ensure_connected(sender: &Session) -> Result<(), ChatError> {
    if sender.is_connected() {
        Ok(())
    } else {
        Err(ChatError::SenderDisconnected {
            username: sender.username().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::message::MessageKind;

    fn router(config: ChatConfig) -> Router {
        let directory = Arc::new(Directory::new(config.mailbox_capacity));
        Router::new(directory, &config)
    }

    #[tokio::test]
    async fn private_message_reaches_only_the_recipient() {
        let router = router(ChatConfig::default());
        let alice = router.directory().connect("alice").await.expect("alice");
        let bob = router.directory().connect("bob").await.expect("bob");
        let carol = router.directory().connect("carol").await.expect("carol");

        let delivery = router
            .private_message(&alice, "bob", "hi")
            .await
            .expect("delivered");
        assert_eq!(delivery, Delivery::Queued);

        let message = bob.receive().await.expect("message");
        assert_eq!(message, Message::private("alice", "hi"));
        assert_eq!(message.kind, MessageKind::Private);
        assert!(matches!(carol.try_receive(), Err(TryRecvError::Empty)));
        assert!(matches!(alice.try_receive(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn broadcast_echoes_to_sender_by_default() {
        let router = router(ChatConfig::default());
        let alice = router.directory().connect("alice").await.expect("alice");
        let bob = router.directory().connect("bob").await.expect("bob");

        let report = router.broadcast(&alice, "hello").await.expect("broadcast");
        assert_eq!(
            report,
            BroadcastReport {
                recipients: 2,
                queued: 2,
                dropped: 0
            }
        );

        let expected = Message::broadcast("alice", "hello");
        assert_eq!(alice.receive().await, Some(expected.clone()));
        assert_eq!(bob.receive().await, Some(expected));
    }

    #[tokio::test]
    async fn broadcast_can_skip_sender() {
        let router = router(ChatConfig::default().with_echo_to_sender(false));
        let alice = router.directory().connect("alice").await.expect("alice");
        let bob = router.directory().connect("bob").await.expect("bob");

        let report = router.broadcast(&alice, "hello").await.expect("broadcast");
        assert_eq!(report.recipients, 1);
        assert_eq!(bob.receive().await.expect("bob").body, "hello");
        assert!(matches!(alice.try_receive(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn broadcast_counts_dropped_deliveries() {
        let capacity = std::num::NonZeroUsize::new(1).expect("non-zero");
        let router = router(ChatConfig::default().with_mailbox_capacity(capacity));
        let alice = router.directory().connect("alice").await.expect("alice");
        let bob = router.directory().connect("bob").await.expect("bob");

        router.broadcast(&alice, "one").await.expect("first");
        let report = router.broadcast(&alice, "two").await.expect("second");
        assert_eq!(report.queued, 0);
        assert_eq!(report.dropped, 2);
        assert_eq!(bob.dropped_messages(), 1);
        assert_eq!(bob.receive().await.expect("first kept").body, "one");
    }

    #[tokio::test]
    async fn disconnected_sender_is_rejected() {
        let router = router(ChatConfig::default());
        let alice = router.directory().connect("alice").await.expect("alice");
        router.directory().connect("bob").await.expect("bob");
        router.directory().disconnect(&alice).await;

        let expected = ChatError::SenderDisconnected {
            username: "alice".into(),
        };
        assert_eq!(
            router.private_message(&alice, "bob", "hey").await.unwrap_err(),
            expected
        );
        assert_eq!(router.broadcast(&alice, "hey").await.unwrap_err(), expected);
    }

    #[tokio::test]
    async fn unknown_recipient_is_reported() {
        let router = router(ChatConfig::default());
        let alice = router.directory().connect("alice").await.expect("alice");

        assert_eq!(
            router
                .private_message(&alice, "ghost", "boo")
                .await
                .unwrap_err(),
            ChatError::RecipientNotFound {
                username: "ghost".into()
            }
        );
        assert!(matches!(alice.try_receive(), Err(TryRecvError::Empty)));
    }
}
