use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use synthstats_core::{
    percent_change, ChartController, ChartPeriod, Granularity, PricePoint, QuerySlot, SlotKey,
};
use tokio::sync::watch;

use crate::cli::ChartArgs;
use crate::error::CliError;

use super::network::elapsed_ms;
use super::{CommandContext, CommandResult};

#[derive(Debug, Serialize)]
struct ChartResponseData {
    period: ChartPeriod,
    granularity: Granularity,
    series: Vec<PricePoint>,
    first: Option<f64>,
    last: Option<f64>,
    /// Change across the window, from the first point to the last.
    percent_change: Option<f64>,
}

pub async fn run(args: &ChartArgs, context: &CommandContext) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let (changes, mut receiver) = watch::channel(0);
    let chart = ChartController::new(
        Arc::clone(&context.router),
        context.strategy.clone(),
        QuerySlot::new(SlotKey::PriceChart, Arc::new(changes)),
    );

    chart.select_period(args.period).await;

    let deadline = tokio::time::Instant::now() + Duration::from_millis(args.wait_ms);
    while chart.slot().result().await.is_loading() {
        match tokio::time::timeout_at(deadline, receiver.changed()).await {
            Ok(Ok(())) => continue,
            Ok(Err(_)) | Err(_) => break,
        }
    }

    let state = chart.slot().snapshot().await;
    let mut warnings = state.warnings;
    if state.result.is_loading() {
        warnings.push(format!("price series still pending after {} ms", args.wait_ms));
    }

    let series = state.result.value().cloned().unwrap_or_default();
    let first = state
        .result
        .as_ref()
        .and_then_some(|series| series.first().map(|point| point.value));
    let last = state
        .result
        .as_ref()
        .and_then_some(|series| series.last().map(|point| point.value));

    let data = serde_json::to_value(ChartResponseData {
        period: args.period,
        granularity: args.period.granularity(),
        percent_change: percent_change(&last, &first),
        first: first.success(),
        last: last.success(),
        series,
    })?;

    Ok(CommandResult::ok(data, state.source_chain)
        .with_errors(state.errors)
        .with_warnings(warnings)
        .with_latency(elapsed_ms(started)))
}

