//! Concurrent workload against a single switchboard.
//!
//! Every participant gets a consumer task that drains its mailbox until the
//! terminal `None`, and a producer task that alternates broadcasts with
//! private messages to a random peer. Producers and consumers run in
//! parallel, so full mailboxes and drops show up under a small capacity.

use std::{fmt, sync::Arc, time::Instant};

use anyhow::{Context, Result};
use futures_util::future::join_all;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::{
    config::ChatConfig,
    directory::Directory,
    error::ChatError,
    router::Router,
    session::{Delivery, Session},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPlan {
    pub participants: usize,
    pub messages_per_participant: usize,
}

/// Delivery accounting for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub participants: usize,
    pub broadcasts: u64,
    pub private_messages: u64,
    /// Deliveries accepted into a mailbox.
    pub queued: u64,
    /// Deliveries dropped because a mailbox was full or closed.
    pub dropped: u64,
    /// Messages consumers pulled out of mailboxes.
    pub received: u64,
    pub elapsed_ms: u64,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "participants:     {}", self.participants)?;
        writeln!(f, "broadcasts:       {}", self.broadcasts)?;
        writeln!(f, "private messages: {}", self.private_messages)?;
        writeln!(f, "queued:           {}", self.queued)?;
        writeln!(f, "dropped:          {}", self.dropped)?;
        writeln!(f, "received:         {}", self.received)?;
        write!(f, "elapsed:          {}ms", self.elapsed_ms)
    }
}

#[derive(Debug, Default)]
struct Tally {
    broadcasts: u64,
    private_messages: u64,
    queued: u64,
    dropped: u64,
}

impl Tally {
    fn record(&mut self, delivery: Delivery) {
        if delivery.is_queued() {
            self.queued += 1;
        } else {
            self.dropped += 1;
        }
    }
}

pub async fn run(plan: LoadPlan, config: &ChatConfig) -> Result<LoadReport> {
    let started = Instant::now();
    let directory = Arc::new(Directory::new(config.mailbox_capacity));
    let router = Router::new(Arc::clone(&directory), config);

    let mut sessions = Vec::with_capacity(plan.participants);
    for index in 0..plan.participants {
        let session = directory
            .connect(&format!("user-{index}"))
            .await
            .with_context(|| format!("failed to connect participant {index}"))?;
        sessions.push(session);
    }
    let usernames: Arc<Vec<String>> = Arc::new(
        sessions
            .iter()
            .map(|session| session.username().to_string())
            .collect(),
    );

    let consumers: Vec<_> = sessions
        .iter()
        .map(|session| tokio::spawn(consume(Arc::clone(session))))
        .collect();
    let producers: Vec<_> = sessions
        .iter()
        .enumerate()
        .map(|(index, session)| {
            tokio::spawn(produce(
                router.clone(),
                Arc::clone(session),
                index,
                Arc::clone(&usernames),
                plan.messages_per_participant,
            ))
        })
        .collect();

    let mut report = LoadReport {
        participants: plan.participants,
        ..LoadReport::default()
    };
    for tally in join_all(producers).await {
        let tally = tally.context("producer task panicked")??;
        report.broadcasts += tally.broadcasts;
        report.private_messages += tally.private_messages;
        report.queued += tally.queued;
        report.dropped += tally.dropped;
    }

    directory.disconnect_all().await;
    for received in join_all(consumers).await {
        report.received += received.context("consumer task panicked")?;
    }

    report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        queued = report.queued,
        dropped = report.dropped,
        received = report.received,
        "load run finished"
    );
    Ok(report)
}

async fn consume(session: Arc<Session>) -> u64 {
    let mut received = 0;
    while session.receive().await.is_some() {
        received += 1;
    }
    received
}

async fn produce(
    router: Router,
    session: Arc<Session>,
    index: usize,
    usernames: Arc<Vec<String>>,
    messages: usize,
) -> Result<Tally, ChatError> {
    let mut tally = Tally::default();
    let peers = usernames.len();

    for sequence in 0..messages {
        let body = format!("{} #{sequence}", session.username());
        if sequence % 2 == 0 || peers < 2 {
            let report = router.broadcast(&session, body).await?;
            tally.broadcasts += 1;
            tally.queued += report.queued as u64;
            tally.dropped += report.dropped as u64;
        } else {
            let offset = rand::thread_rng().gen_range(1..peers);
            let recipient = &usernames[(index + offset) % peers];
            let delivery = router.private_message(&session, recipient, body).await?;
            tally.private_messages += 1;
            tally.record(delivery);
        }
    }

    Ok(tally)
}
