//! In-process chat switchboard: sessions with private mailboxes, a
//! directory of who is online, and a router for broadcast and private
//! delivery.
//!
//! Each module focuses on a concrete responsibility:
//!
//! - [`session`] holds one participant's bounded FIFO mailbox and lifecycle
//!   state behind a single session-scoped lock.
//! - [`directory`] maps usernames to live sessions and owns connect and
//!   disconnect.
//! - [`router`] fans broadcasts out over a directory snapshot and resolves
//!   private-message recipients.
//! - [`message`] and [`error`] define what travels through mailboxes and
//!   what can go wrong.
//! - [`config`] and [`cli`] carry the mailbox capacity and echo policy.
//! - [`console`] and [`load`] are the in-process front ends used by the
//!   binary.
//!
//! A front end connects a session per participant, calls the router as
//! commands arrive, loops on [`session::Session::receive`] until it yields
//! `None`, and disconnects through the directory when the participant
//! leaves.

pub mod cli;
pub mod config;
pub mod console;
pub mod directory;
pub mod error;
pub mod load;
pub mod message;
pub mod router;
pub mod session;

pub use config::ChatConfig;
pub use directory::Directory;
pub use error::ChatError;
pub use message::{Message, MessageKind};
pub use router::{BroadcastReport, Router};
pub use session::{Delivery, Session, SessionState};
