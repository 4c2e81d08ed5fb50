use std::{
    fmt,
    num::NonZeroUsize,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::{
    Mutex as AsyncMutex,
    mpsc::{
        self,
        error::{TryRecvError, TrySendError},
    },
};
use tracing::debug;

use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Disconnected,
}

/// What happened to a message handed to [`Session::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The mailbox was at capacity and the new message was dropped.
    MailboxFull,
    /// The session was already disconnected and the message was dropped.
    Closed,
}

impl Delivery {
    pub fn is_queued(self) -> bool {
        matches!(self, Delivery::Queued)
    }
}

/// Write half of the mailbox. The lifecycle flag is the variant itself, so a
/// sender can never observe `Open` while the channel is being closed.
enum Outbox {
    Open(mpsc::Sender<Message>),
    Closed,
}

/// One connected participant: a username plus a bounded FIFO mailbox.
///
/// Sessions are created and torn down by [`crate::directory::Directory`];
/// everybody else only sends to them or reads from them.
pub struct Session {
    username: String,
    outbox: Mutex<Outbox>,
    inbox: AsyncMutex<mpsc::Receiver<Message>>,
    dropped: AtomicU64,
}

impl Session {
    pub(crate) fn new(username: String, capacity: NonZeroUsize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.get());
        Self {
            username,
            outbox: Mutex::new(Outbox::Open(sender)),
            inbox: AsyncMutex::new(receiver),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn state(&self) -> SessionState {
        match *self.lock_outbox() {
            Outbox::Open(_) => SessionState::Connected,
            Outbox::Closed => SessionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Messages dropped so far because the mailbox was full.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Enqueues `message` without blocking.
    ///
    /// A full mailbox drops the new message. A disconnected session drops it
    /// silently; that only happens when a sender raced the teardown.
    pub fn send(&self, message: Message) -> Delivery {
        let outbox = self.lock_outbox();
        let Outbox::Open(sender) = &*outbox else {
            return Delivery::Closed;
        };

        match sender.try_send(message) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(message)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    username = %self.username,
                    from = %message.from,
                    "mailbox full, dropping message"
                );
                Delivery::MailboxFull
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the session is disconnected and every message
    /// queued before the disconnect has been handed out.
    pub async fn receive(&self) -> Option<Message> {
        self.inbox.lock().await.recv().await
    }

    /// Takes the next queued message if there is one, without waiting.
    ///
    /// While another task is parked in [`Session::receive`] the mailbox
    /// belongs to that task and this reports `Empty`.
    pub fn try_receive(&self) -> Result<Message, TryRecvError> {
        match self.inbox.try_lock() {
            Ok(mut inbox) => inbox.try_recv(),
            Err(_) => Err(TryRecvError::Empty),
        }
    }

    /// Closes the mailbox. Returns `false` if it was already closed.
    ///
    /// Dropping the only channel sender wakes a parked `receive`.
    pub(crate) fn disconnect(&self) -> bool {
        let mut outbox = self.lock_outbox();
        matches!(
            std::mem::replace(&mut *outbox, Outbox::Closed),
            Outbox::Open(_)
        )
    }

    fn lock_outbox(&self) -> MutexGuard<'_, Outbox> {
        // The outbox is replaced in a single assignment, so it is valid even
        // if a holder panicked.
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("state", &self.state())
            .field("dropped", &self.dropped_messages())
            .finish()
    }
}
