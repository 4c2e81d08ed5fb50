use thiserror::Error;

/// Recoverable failures surfaced by the directory and router.
///
/// None of these are fatal; a front end maps them onto whatever error reply
/// its protocol uses and keeps the participant's connection alive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("username '{username}' is already taken")]
    UsernameAlreadyTaken { username: String },
    #[error("recipient '{username}' not found")]
    RecipientNotFound { username: String },
    #[error("sender '{username}' is disconnected")]
    SenderDisconnected { username: String },
    #[error("username cannot be empty")]
    InvalidUsername,
}
