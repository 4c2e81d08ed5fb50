use std::num::NonZeroUsize;

use clap::{Args, Parser, Subcommand};

use crate::config::ChatConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive an in-process switchboard from line commands on stdin.
    Console(ConsoleArgs),
    /// Hammer a switchboard with concurrent participants and report delivery counts.
    Load(LoadArgs),
}

/// Switchboard settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Messages each mailbox holds before new ones are dropped.
    #[arg(long, default_value = "256")]
    pub mailbox_capacity: NonZeroUsize,

    /// Do not deliver a broadcast back to its sender.
    #[arg(long)]
    pub no_echo: bool,
}

impl From<&ChatArgs> for ChatConfig {
    fn from(args: &ChatArgs) -> Self {
        ChatConfig::default()
            .with_mailbox_capacity(args.mailbox_capacity)
            .with_echo_to_sender(!args.no_echo)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConsoleArgs {
    #[command(flatten)]
    pub chat: ChatArgs,
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Number of sessions to connect.
    #[arg(long, default_value = "8")]
    pub participants: NonZeroUsize,

    /// Operations each participant issues, alternating broadcast and private message.
    #[arg(long, default_value_t = 100)]
    pub messages: usize,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub chat: ChatArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_flags_map_onto_config() {
        let cli = Cli::parse_from([
            "chat_switchboard",
            "load",
            "--participants",
            "3",
            "--mailbox-capacity",
            "4",
            "--no-echo",
        ]);
        let Command::Load(args) = cli.command else {
            panic!("expected load subcommand");
        };

        let config = ChatConfig::from(&args.chat);
        assert_eq!(config.mailbox_capacity.get(), 4);
        assert!(!config.echo_to_sender);
        assert_eq!(args.participants.get(), 3);
        assert_eq!(args.messages, 100);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = Cli::try_parse_from(["chat_switchboard", "console", "--mailbox-capacity", "0"]);
        assert!(result.is_err());
    }
}
