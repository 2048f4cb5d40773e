use serde_json::Value;
use synthstats_core::Envelope;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Ndjson => {
            let payload = serde_json::to_string(envelope)?;
            println!("{payload}");
        }
        OutputFormat::Table => render_table(envelope)?,
    }

    Ok(())
}

fn render_table(envelope: &Envelope<Value>) -> Result<(), CliError> {
    println!("request_id  : {}", envelope.meta.request_id);
    println!("schema      : {}", envelope.meta.schema_version);
    println!("generated_at: {}", envelope.meta.generated_at);
    println!(
        "sources     : {}",
        envelope
            .meta
            .source_chain
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
    );
    println!("latency_ms  : {}", envelope.meta.latency_ms);

    if !envelope.meta.warnings.is_empty() {
        println!("warnings:");
        for warning in &envelope.meta.warnings {
            println!("  - {warning}");
        }
    }

    match envelope.data.get("view") {
        Some(view) => render_panels(view),
        None => {
            println!("data:");
            let pretty_data = serde_json::to_string_pretty(&envelope.data)?;
            for line in pretty_data.lines() {
                println!("  {line}");
            }
        }
    }

    if !envelope.errors.is_empty() {
        println!("errors:");
        for error in &envelope.errors {
            match &error.slot {
                Some(slot) => println!("  - [{slot}] {}: {}", error.code, error.message),
                None => println!("  - {}: {}", error.code, error.message),
            }
        }
    }

    Ok(())
}

fn render_panels(view: &Value) {
    if let Some(chart) = view.get("price_chart") {
        println!(
            "{:<24}{}  ({})",
            text(chart, "title"),
            display(chart, "display"),
            text(chart, "active_period")
        );
    }

    for row in ["market", "staking", "collateral"] {
        println!("{row}:");
        let panels = view
            .pointer(&format!("/{row}/panels"))
            .and_then(Value::as_array);
        for panel in panels.into_iter().flatten() {
            println!("  {:<22}{}", text(panel, "title"), display(panel, "display"));
        }
    }

    if let Some(distribution) = view.get("susd_distribution") {
        println!(
            "susd holders (total supply {}):",
            display(distribution, "total_supply_display")
        );
        let holders = distribution.get("holders").and_then(Value::as_array);
        for holder in holders.into_iter().flatten() {
            let value = holder.get("value").and_then(Value::as_f64).unwrap_or_default();
            println!("  {:<22}{value:.2}", text(holder, "name"));
        }
    }
}

fn text<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or_default()
}

/// Pending values render as a dash, failed ones too.
fn display<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or("-")
}
