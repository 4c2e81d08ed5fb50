use std::num::NonZeroUsize;

/// Mailbox capacity used when nothing else is configured.
pub const DEFAULT_MAILBOX_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// Runtime knobs shared by the directory and the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatConfig {
    /// Messages a mailbox holds before new ones are dropped.
    pub mailbox_capacity: NonZeroUsize,
    /// Whether a broadcaster receives its own broadcast.
    pub echo_to_sender: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            echo_to_sender: true,
        }
    }
}

impl ChatConfig {
    pub fn with_mailbox_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn with_echo_to_sender(mut self, echo: bool) -> Self {
        self.echo_to_sender = echo;
        self
    }
}
