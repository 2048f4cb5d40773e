mod chart;
mod network;
mod sources;

use std::sync::Arc;

use serde_json::Value;
use synthstats_core::{
    Envelope, EnvelopeError, NetworkConfig, ProviderId, SourceRouter, SourceRouterBuilder,
    SourceStrategy,
};
use tracing::warn;

use crate::cli::{Cli, Command, SourceSelector};
use crate::error::CliError;
use crate::metadata::{Metadata, RequestId};

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
    pub source_chain: Vec<ProviderId>,
}

impl CommandResult {
    pub fn ok(data: Value, source_chain: Vec<ProviderId>) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
            source_chain,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

/// Everything a command needs, built once from the global flags.
pub struct CommandContext {
    pub router: Arc<SourceRouter>,
    pub config: Arc<NetworkConfig>,
    pub strategy: SourceStrategy,
    request_id: RequestId,
    warnings: Vec<String>,
}

impl CommandContext {
    fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut config = NetworkConfig::load(cli.config.as_deref())?;
        if let Some(timeout_ms) = cli.timeout_ms {
            config.timeout_ms = timeout_ms;
        }

        let mut builder = SourceRouterBuilder::new().with_config(config.clone());
        if cli.mock {
            builder = builder.with_mock_mode();
        }
        let router = builder.build();

        let mut warnings = Vec::new();
        if !cli.mock && router.is_fixture_only() {
            warn!("no live source configured, serving fixture data");
            warnings.push(String::from(
                "no live source configured; values come from fixture data",
            ));
        }

        Ok(Self {
            router: Arc::new(router),
            config: Arc::new(config),
            strategy: to_source_strategy(cli.source),
            request_id: RequestId::new_v4(),
            warnings,
        })
    }

    /// Wraps a command result in an envelope carrying this run's request id.
    pub fn envelope(&self, result: CommandResult) -> Result<Envelope<Value>, CliError> {
        let CommandResult {
            data,
            warnings,
            errors,
            latency_ms,
            mut source_chain,
        } = result;

        if source_chain.is_empty() {
            source_chain = self.router.registered_sources();
        }

        let mut metadata =
            Metadata::new(source_chain, latency_ms)?.with_request_id(self.request_id);
        for warning in self.warnings.iter().cloned().chain(warnings) {
            metadata.push_warning(warning);
        }

        Ok(Envelope::new(metadata.into_envelope_meta(), data, errors))
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let context = CommandContext::from_cli(cli)?;

    let command_result = match &cli.command {
        Command::Network(args) => network::run(args, &context).await?,
        Command::Chart(args) => chart::run(args, &context).await?,
        Command::Sources(args) => sources::run(args, &context).await?,
    };

    context.envelope(command_result)
}

fn to_source_strategy(source: SourceSelector) -> SourceStrategy {
    match source {
        SourceSelector::Auto => SourceStrategy::Auto,
        SourceSelector::Fixture => SourceStrategy::Strict(ProviderId::Fixture),
        SourceSelector::Rpc => SourceStrategy::Strict(ProviderId::Rpc),
        SourceSelector::Subgraph => SourceStrategy::Strict(ProviderId::Subgraph),
        SourceSelector::Cmc => SourceStrategy::Strict(ProviderId::Cmc),
    }
}
