//! Atlas: multi-chain entity discovery and reconciliation pipeline.
//!
//! Loads a catalog of declared nodes, probes the configured chains and
//! governance services, and writes discovered nodes and relationship pairs
//! as JSON lines.
//!
//! ```bash
//! # One pass over the declared catalog
//! atlas --config atlas.toml run --nodes nodes.json --output out.jsonl
//!
//! # Three passes, so stubs discovered early get post-processed too
//! atlas --config atlas.toml run --passes 3
//! ```

mod store;

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use atlas::core::{
    run_pass, AdapterRegistry, AtlasConfig, GuardTable, NodeStore, PassOutcome, Pipeline,
    PipelineOptions, Resolver, StageRegistry,
};
use atlas::model::{Network, Node};
use atlas::stages::default_stages;
use atlas_adapter_evm::{EvmAdapter, EvmAdapterConfig, SubgraphRoleGroups};
use atlas_adapter_near::rpc::NearRpc;
use atlas_adapter_near::{NearAdapter, NearAdapterConfig};
use atlas_policy_astrodao::{AstroDaoClient, AstroDaoPolicy, PolicyDocumentSource};
use atlas_policy_safe::SafePolicy;
use clap::{Parser, Subcommand};

use crate::store::{DeclaredStore, RunCache};

#[derive(Parser)]
#[command(name = "atlas", about = "Multi-chain entity discovery pipeline")]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "atlas.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run discovery passes over the declared nodes.
    Run {
        /// Declared-node JSON file; overrides `nodes_file` from the config.
        #[arg(long)]
        nodes: Option<String>,
        /// JSON-lines output file; stdout when omitted.
        #[arg(long)]
        output: Option<String>,
        /// Number of passes; later passes see the nodes discovered earlier.
        #[arg(long, default_value_t = 1)]
        passes: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = AtlasConfig::new(&cli.config)?;
    match cli.command {
        Command::Run {
            nodes,
            output,
            passes,
        } => run(config, nodes, output, passes).await,
    }
}

async fn run(
    config: AtlasConfig,
    nodes_file: Option<String>,
    output: Option<String>,
    passes: usize,
) -> Result<()> {
    let nodes_file = nodes_file
        .or_else(|| config.nodes_file.clone())
        .ok_or_else(|| anyhow!("no declared-node file: pass --nodes or set nodes_file"))?;
    let store = Arc::new(DeclaredStore::load(&nodes_file)?);
    tracing::info!(
        declared = store.count(),
        file = nodes_file.as_str(),
        "declared nodes loaded"
    );

    let (adapters, dao_documents) = build_adapters(&config)?;
    let adapters = Arc::new(adapters);
    let resolver = Arc::new(Resolver::new(
        adapters.clone(),
        store.clone() as Arc<dyn NodeStore>,
    ));
    let stages = StageRegistry::with_stages(default_stages(dao_documents))?;

    let pipeline = Pipeline {
        stages,
        adapters,
        resolver,
        guards: Arc::new(GuardTable::new()),
        cache: Arc::new(RunCache::new()),
        options: PipelineOptions {
            ttl: chrono::Duration::minutes(config.pipeline.ttl_minutes),
            retries: config.pipeline.retry,
        },
    };

    let mut writer = open_output(output.as_deref())?;
    let mut input = store.nodes();
    for pass in 0..passes.max(1) {
        tracing::info!(pass, nodes = input.len(), "starting pass");
        let outcome = run_pass(&pipeline, input).await;
        write_outcome(&outcome, writer.as_mut())?;
        input = next_input(outcome);
    }
    Ok(())
}

/// Wire the configured chains and governance schemes into a registry.
/// Returns the registry plus the DAO policy-document source, when one can
/// be built, for the dao-roles stage.
#[allow(clippy::type_complexity)]
fn build_adapters(
    config: &AtlasConfig,
) -> Result<(AdapterRegistry, Option<Arc<dyn PolicyDocumentSource>>)> {
    let mut adapters = AdapterRegistry::new();
    let mut near_rpc: Option<Arc<NearRpc>> = None;
    let mut evm_networks = Vec::new();
    let request_delay_ms = Some(config.pipeline.request_delay_ms);

    for (name, network_config) in &config.networks {
        let network: Network = name
            .parse()
            .map_err(|_| anyhow!("unknown network '{name}' in configuration"))?;
        match network {
            Network::Ethereum | Network::Aurora => {
                let adapter = EvmAdapter::new(
                    network,
                    EvmAdapterConfig {
                        rpc_url: network_config.rpc_url.clone(),
                        explorer_url: network_config.explorer_url.clone(),
                        explorer_api_key: network_config.explorer_api_key.clone(),
                        request_delay_ms,
                    },
                )?;
                adapters.register_chain(Arc::new(adapter))?;
                evm_networks.push(network);
            }
            Network::Near => {
                let adapter = NearAdapter::new(NearAdapterConfig {
                    rpc_url: network_config.rpc_url.clone(),
                    explorer_url: network_config.explorer_url.clone(),
                    explorer_api_key: network_config.explorer_api_key.clone(),
                    request_delay_ms,
                })?;
                near_rpc = Some(adapter.rpc());
                adapters.register_role_groups(Network::Near, Arc::new(adapter.acl_role_groups()));
                adapters.register_chain(Arc::new(adapter))?;
            }
        }
    }

    if let Some(safe) = config.policies.get("safe") {
        if let Some(url) = &safe.subgraph_url {
            let subgraph = Arc::new(SubgraphRoleGroups::new(url)?);
            for network in &evm_networks {
                adapters.register_role_groups(*network, subgraph.clone());
            }
        }
        if let Some(url) = &safe.service_url {
            let policy = Arc::new(SafePolicy::new(url)?);
            for network in &evm_networks {
                adapters.register_policy(*network, policy.clone());
            }
        }
    }

    let mut dao_documents: Option<Arc<dyn PolicyDocumentSource>> = None;
    if let Some(astrodao) = config.policies.get("astrodao") {
        let rpc = match &astrodao.service_url {
            Some(url) => Arc::new(NearRpc::new(url)?),
            None => near_rpc
                .clone()
                .context("astrodao policy configured without a near network or service_url")?,
        };
        let source: Arc<dyn PolicyDocumentSource> = Arc::new(AstroDaoClient::new(rpc));
        adapters.register_policy(Network::Near, Arc::new(AstroDaoPolicy::new(source.clone())));
        dao_documents = Some(source);
    }

    Ok((adapters, dao_documents))
}

fn open_output(path: Option<&str>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(
            std::fs::File::create(path).with_context(|| format!("creating '{path}'"))?,
        ),
        None => Box::new(std::io::stdout()),
    })
}

fn write_outcome(outcome: &PassOutcome, writer: &mut dyn Write) -> Result<()> {
    for node in outcome.nodes.iter().chain(&outcome.emitted) {
        serde_json::to_writer(
            &mut *writer,
            &serde_json::json!({
                "record": "node",
                "namespace": node.namespace(),
                "name": node.name(),
                "node": node,
            }),
        )?;
        writer.write_all(b"\n")?;
    }
    for pair in &outcome.relations {
        for edge in [&pair.forward, &pair.backward] {
            serde_json::to_writer(
                &mut *writer,
                &serde_json::json!({ "record": "relation", "edge": edge }),
            )?;
            writer.write_all(b"\n")?;
        }
    }
    for error in &outcome.errors {
        serde_json::to_writer(
            &mut *writer,
            &serde_json::json!({
                "record": "error",
                "stage": error.stage,
                "node": error.node,
                "message": error.message,
            }),
        )?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Feed the next pass with this pass's updated nodes plus everything newly
/// discovered, one entry per identity.
fn next_input(outcome: PassOutcome) -> Vec<Node> {
    let mut seen = HashSet::new();
    let mut next = Vec::new();
    for node in outcome.nodes.into_iter().chain(outcome.emitted) {
        if seen.insert(node.id.clone()) {
            next.push(node);
        }
    }
    next
}
