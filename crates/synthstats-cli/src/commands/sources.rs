use std::collections::BTreeMap;

use serde::Serialize;
use synthstats_core::{Endpoint, ProviderId, SourceSnapshot, SourceStrategy};

use crate::cli::SourcesArgs;
use crate::error::CliError;

use super::{CommandContext, CommandResult};

#[derive(Debug, Serialize)]
struct SourceStatus {
    id: ProviderId,
    registered: bool,
    available: bool,
    status: &'static str,
    score: Option<u16>,
    capabilities: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SourcesResponseData {
    strategy: String,
    sources: Vec<SourceStatus>,
    /// Order in which sources are tried for each endpoint.
    routes: BTreeMap<&'static str, Vec<ProviderId>>,
}

pub async fn run(args: &SourcesArgs, context: &CommandContext) -> Result<CommandResult, CliError> {
    let mut sources = Vec::new();
    for id in ProviderId::ALL {
        match context.router.snapshot(id).await {
            Some(snapshot) => sources.push(registered(snapshot)),
            None if args.verbose => sources.push(SourceStatus {
                id,
                registered: false,
                available: false,
                status: "not_configured",
                score: None,
                capabilities: Vec::new(),
            }),
            None => {}
        }
    }

    let mut routes = BTreeMap::new();
    for endpoint in Endpoint::ALL {
        let chain = context
            .router
            .source_chain_for_strategy(endpoint, &context.strategy)
            .await;
        routes.insert(endpoint.as_str(), chain);
    }

    let data = serde_json::to_value(SourcesResponseData {
        strategy: strategy_label(&context.strategy),
        sources,
        routes,
    })?;

    Ok(CommandResult::ok(data, context.router.registered_sources()))
}

fn registered(snapshot: SourceSnapshot) -> SourceStatus {
    SourceStatus {
        id: snapshot.id,
        registered: true,
        available: snapshot.available(),
        status: snapshot.status_label(),
        score: Some(snapshot.health.score),
        capabilities: snapshot.capabilities.supported_endpoints(),
    }
}

fn strategy_label(strategy: &SourceStrategy) -> String {
    match strategy {
        SourceStrategy::Auto => String::from("auto"),
        SourceStrategy::Priority(order) => format!(
            "priority:{}",
            order
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(",")
        ),
        SourceStrategy::Strict(id) => format!("strict:{id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_labels_name_their_sources() {
        assert_eq!(strategy_label(&SourceStrategy::Auto), "auto");
        assert_eq!(
            strategy_label(&SourceStrategy::Strict(ProviderId::Subgraph)),
            "strict:subgraph"
        );
        assert_eq!(
            strategy_label(&SourceStrategy::Priority(vec![ProviderId::Cmc, ProviderId::Fixture])),
            "priority:cmc,fixture"
        );
    }
}
