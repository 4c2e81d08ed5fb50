//! Line-oriented shell over an in-process switchboard.
//!
//! The console plays the part a network transport would: it connects
//! sessions on request, keeps their handles, routes commands through the
//! [`Router`], and drains mailboxes when asked. Output goes to the supplied
//! writer one line at a time so the whole exchange can be scripted.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, anyhow};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc::error::TryRecvError,
};

use crate::{
    config::ChatConfig,
    directory::Directory,
    router::Router,
    session::{Delivery, Session},
};

const USAGE: &str = "invalid command. Try: CONNECT/c <user>, SAY/s <user> <text>, \
WHISPER/w <from> <to> <text>, INBOX/i <user>, WHO, DISCONNECT/d <user>, HELP/h, EXIT/e";

const HELP_LINES: &[&str] = &[
    "CONNECT/c <user>              connect a new session",
    "SAY/s <user> <text>           broadcast from <user>",
    "WHISPER/w <from> <to> <text>  private message",
    "INBOX/i <user>                show queued messages for <user>",
    "WHO                           list connected users",
    "DISCONNECT/d <user>           disconnect <user>",
    "HELP/h                        show this help",
    "EXIT/e                        disconnect everyone and quit",
];

/// Commands accepted at the console prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect { username: String },
    Say { from: String, text: String },
    Whisper { from: String, to: String, text: String },
    Inbox { username: String },
    Who,
    Disconnect { username: String },
    Help,
    Exit,
}

impl ConsoleCommand {
    /// Parses one line of input.
    ///
    /// Command words are case-insensitive and accept single-letter aliases.
    /// Message text keeps its inner spacing.
    pub fn parse(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        let Some((word, rest)) = next_word(trimmed) else {
            return Err(anyhow!("empty command"));
        };

        let cmd = word.to_uppercase();
        let normalized_cmd = match cmd.as_str() {
            "C" => "CONNECT",
            "S" => "SAY",
            "W" => "WHISPER",
            "I" => "INBOX",
            "D" => "DISCONNECT",
            "H" => "HELP",
            "E" => "EXIT",
            other => other,
        };

        match normalized_cmd {
            "HELP" => Ok(ConsoleCommand::Help),
            "EXIT" => Ok(ConsoleCommand::Exit),
            "WHO" => Ok(ConsoleCommand::Who),
            "CONNECT" => single_argument(rest, "CONNECT <user>")
                .map(|username| ConsoleCommand::Connect { username }),
            "INBOX" => single_argument(rest, "INBOX <user>")
                .map(|username| ConsoleCommand::Inbox { username }),
            "DISCONNECT" => single_argument(rest, "DISCONNECT <user>")
                .map(|username| ConsoleCommand::Disconnect { username }),
            "SAY" => {
                let (from, text) = next_word(rest)
                    .filter(|(_, text)| !text.is_empty())
                    .ok_or_else(|| anyhow!("SAY requires a user and text: SAY <user> <text>"))?;
                Ok(ConsoleCommand::Say {
                    from: from.to_string(),
                    text: text.to_string(),
                })
            }
            "WHISPER" => {
                let (from, to, text) = next_word(rest)
                    .and_then(|(from, rest)| next_word(rest).map(|(to, text)| (from, to, text)))
                    .filter(|(_, _, text)| !text.is_empty())
                    .ok_or_else(|| {
                        anyhow!("WHISPER requires two users and text: WHISPER <from> <to> <text>")
                    })?;
                Ok(ConsoleCommand::Whisper {
                    from: from.to_string(),
                    to: to.to_string(),
                    text: text.to_string(),
                })
            }
            _ => Err(anyhow!(USAGE)),
        }
    }
}

fn next_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim_start())),
        None => Some((input, "")),
    }
}

fn single_argument(rest: &str, usage: &str) -> Result<String> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(word), None) => Ok(word.to_string()),
        _ => Err(anyhow!("expected exactly one argument: {usage}")),
    }
}

/// Session handles held on behalf of console users.
///
/// Handles outlive a disconnect so later commands observe the closed
/// session; a new CONNECT with the same name replaces the handle.
pub struct Console {
    router: Router,
    sessions: HashMap<String, Arc<Session>>,
}

impl Console {
    pub fn new(config: &ChatConfig) -> Self {
        let directory = Arc::new(Directory::new(config.mailbox_capacity));
        Self {
            router: Router::new(directory, config),
            sessions: HashMap::new(),
        }
    }

    /// Runs one command and returns the lines to print.
    pub async fn execute(&mut self, command: ConsoleCommand) -> Result<Vec<String>> {
        let directory = Arc::clone(self.router.directory());
        match command {
            ConsoleCommand::Connect { username } => {
                let session = directory.connect(&username).await?;
                let line = format!("*** {} connected", session.username());
                self.sessions.insert(session.username().to_string(), session);
                Ok(vec![line])
            }
            ConsoleCommand::Say { from, text } => {
                let sender = self.session(&from)?;
                let report = self.router.broadcast(&sender, text).await?;
                Ok(vec![format!(
                    "*** broadcast from {from} reached {} of {}",
                    report.queued, report.recipients
                )])
            }
            ConsoleCommand::Whisper { from, to, text } => {
                let sender = self.session(&from)?;
                let line = match self.router.private_message(&sender, &to, text).await? {
                    Delivery::Queued => format!("*** whisper to {to} queued"),
                    Delivery::MailboxFull => format!("*** {to}'s mailbox is full, message dropped"),
                    Delivery::Closed => format!("*** {to} disconnected, message dropped"),
                };
                Ok(vec![line])
            }
            ConsoleCommand::Inbox { username } => {
                let session = self.session(&username)?;
                drain_inbox(&session)
            }
            ConsoleCommand::Who => {
                let names = directory.usernames().await;
                if names.is_empty() {
                    Ok(vec!["*** nobody online".to_string()])
                } else {
                    Ok(vec![format!("*** online: {}", names.join(", "))])
                }
            }
            ConsoleCommand::Disconnect { username } => {
                let session = self.session(&username)?;
                if directory.disconnect(&session).await {
                    Ok(vec![format!("*** {username} disconnected")])
                } else {
                    Ok(vec![format!("*** {username} was already disconnected")])
                }
            }
            ConsoleCommand::Help => Ok(HELP_LINES.iter().map(|line| line.to_string()).collect()),
            ConsoleCommand::Exit => {
                self.shutdown().await;
                Ok(vec!["*** leaving console".to_string()])
            }
        }
    }

    /// Disconnects everyone still online.
    pub async fn shutdown(&mut self) {
        self.router.directory().disconnect_all().await;
    }

    fn session(&self, username: &str) -> Result<Arc<Session>> {
        self.sessions
            .get(username)
            .cloned()
            .ok_or_else(|| anyhow!("no session for '{username}'; CONNECT it first"))
    }
}

fn drain_inbox(session: &Session) -> Result<Vec<String>> {
    let username = session.username();
    let mut lines = Vec::new();
    loop {
        match session.try_receive() {
            Ok(message) => lines.push(format!("{username} <= {message}")),
            Err(TryRecvError::Empty) => {
                if lines.is_empty() {
                    lines.push(format!("*** no messages for {username}"));
                }
                return Ok(lines);
            }
            Err(TryRecvError::Disconnected) => {
                lines.push(format!("*** {username}'s mailbox is closed"));
                return Ok(lines);
            }
        }
    }
}

/// Reads commands from `reader` until EXIT or end of input.
pub async fn run<R, W>(reader: R, writer: &mut W, config: &ChatConfig) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut console = Console::new(config);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match ConsoleCommand::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                write_line(writer, &format!("!!! {err}")).await?;
                continue;
            }
        };

        let exit = command == ConsoleCommand::Exit;
        match console.execute(command).await {
            Ok(output) => {
                for line in output {
                    write_line(writer, &line).await?;
                }
            }
            Err(err) => write_line(writer, &format!("!!! {err}")).await?,
        }

        if exit {
            return Ok(());
        }
    }

    console.shutdown().await;
    Ok(())
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
