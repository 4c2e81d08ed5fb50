use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::info;

use chat_switchboard::{
    ChatConfig,
    cli::{Cli, Command},
    console,
    load::{self, LoadPlan},
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Stdout carries console output; logs go to stderr.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Console(args) => {
            let config = ChatConfig::from(&args.chat);
            info!(?config, "console ready");
            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            console::run(stdin, &mut stdout, &config).await?;
        }
        Command::Load(args) => {
            let config = ChatConfig::from(&args.chat);
            let plan = LoadPlan {
                participants: args.participants.get(),
                messages_per_participant: args.messages,
            };
            info!(?plan, ?config, "starting load run");
            let report = load::run(plan, &config).await?;
            if args.json {
                let encoded =
                    serde_json::to_string_pretty(&report).context("failed to encode report")?;
                println!("{encoded}");
            } else {
                println!("{report}");
            }
        }
    }

    Ok(())
}
