use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use synthstats_core::{compose, NetworkConfig, NetworkSection, NetworkSnapshot, NetworkView};
use tracing::info;

use crate::cli::{NetworkArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::{CommandContext, CommandResult};

#[derive(Debug, Serialize)]
struct NetworkResponseData {
    settled: bool,
    view: NetworkView,
}

pub async fn run(args: &NetworkArgs, context: &CommandContext) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let section = NetworkSection::new(
        Arc::clone(&context.router),
        Arc::clone(&context.config),
        context.strategy.clone(),
    );

    section.start(args.period).await;

    let timeout = Duration::from_millis(args.wait_ms);
    let settled = if args.incremental {
        stream_until_settled(&section, timeout, context, started).await?
    } else {
        section.wait_until_settled(timeout).await
    };

    let snapshot = section.snapshot().await;
    info!(settled, pending = snapshot.pending.len(), "network section rendered");

    let mut result = to_result(snapshot, &context.config, started)?;
    if !settled {
        result = result.with_warnings(vec![format!(
            "stats still pending after {} ms",
            args.wait_ms
        )]);
    }
    Ok(result)
}

/// Prints one NDJSON envelope per change until the section settles.
///
/// Returns whether it settled before `timeout`.
async fn stream_until_settled(
    section: &NetworkSection,
    timeout: Duration,
    context: &CommandContext,
    started: Instant,
) -> Result<bool, CliError> {
    let mut changes = section.subscribe();
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        changes.borrow_and_update();
        let snapshot = section.snapshot().await;
        if snapshot.is_settled() {
            return Ok(true);
        }

        let partial = to_result(snapshot, &context.config, started)?;
        output::render(&context.envelope(partial)?, OutputFormat::Ndjson, false)?;

        match tokio::time::timeout_at(deadline, changes.changed()).await {
            Ok(Ok(())) => continue,
            Ok(Err(_)) | Err(_) => return Ok(section.snapshot().await.is_settled()),
        }
    }
}

fn to_result(
    snapshot: NetworkSnapshot,
    config: &NetworkConfig,
    started: Instant,
) -> Result<CommandResult, CliError> {
    let view = compose(&snapshot, config);
    let data = serde_json::to_value(NetworkResponseData {
        settled: snapshot.is_settled(),
        view,
    })?;

    Ok(CommandResult::ok(data, snapshot.source_chain)
        .with_errors(snapshot.errors)
        .with_warnings(snapshot.warnings)
        .with_latency(elapsed_ms(started)))
}

pub(super) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
