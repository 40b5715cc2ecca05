use std::path::PathBuf;

use a2ui_kit::a2ui::{
    A2uiEngine, A2uiHost, Catalog, ConversationContext, EngineConfig, ErrorDetail, RenderNode,
    parse_messages,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use url::Url;

#[derive(Parser)]
#[command(
    name = "a2ui-host",
    about = "Drive A2UI surfaces from a message log or a live AG-UI agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = "a2ui.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply A2UI messages from a file and print the resulting surfaces
    Replay {
        /// JSON array, single message or JSON lines
        file: PathBuf,
    },

    /// Send one request to an agent and print the surfaces it builds
    Prompt {
        text: String,

        /// Agent server base URL (overrides config and A2UI_AGENT_URL)
        #[arg(long)]
        endpoint: Option<Url>,

        /// Agent id below the server URL
        #[arg(long)]
        agent: Option<String>,
    },
}

/// What gets printed per surface.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SurfaceReport {
    surface_id: String,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<RenderNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    diagnostics: Vec<ErrorDetail>,
}

fn report<C: Catalog>(engine: &A2uiEngine<C>) -> Vec<SurfaceReport> {
    engine
        .surface_ids()
        .into_iter()
        .map(|surface_id| {
            let (tree, diagnostics) = engine.renderable_tree(surface_id);
            SurfaceReport {
                surface_id: surface_id.to_string(),
                state: format!("{:?}", engine.surface_state(surface_id)),
                tree,
                diagnostics: diagnostics.reports().to_vec(),
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let mut config = EngineConfig::from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env_overrides()?;

    let reports = match cli.command {
        Commands::Replay { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;

            let messages = parse_messages(&text)?;

            let mut context = ConversationContext::new();
            context.push_user_turn(format!("replay {}", file.display()));
            let mut turns: Vec<String> = Vec::new();
            for message in messages {
                if let Some(turn) = context.receive(message) {
                    if !turns.contains(&turn) {
                        turns.push(turn);
                    }
                }
            }

            let mut engine =
                A2uiEngine::with_standard_catalog().with_pruning(config.prune_deleted_surfaces);
            let mut applied = 0;
            for turn in &turns {
                for (_, batch) in context.surface_batches(turn) {
                    applied += engine.process_messages(batch).len();
                }
            }
            ::log::info!("Applied {} events from {}", applied, file.display());

            report(&engine)
        }
        Commands::Prompt {
            text,
            endpoint,
            agent,
        } => {
            if let Some(endpoint) = endpoint {
                config.transport.endpoint = Some(endpoint);
            }
            if let Some(agent) = agent {
                config.transport.agent_id = agent;
            }

            let mut host = A2uiHost::from_config(config)?;

            let interrupted = tokio::select! {
                result = host.send_prompt(&text) => {
                    let events = result?;
                    ::log::info!("Agent produced {} events", events.len());
                    false
                }
                _ = tokio::signal::ctrl_c() => true,
            };
            if interrupted {
                ::log::warn!("Interrupted before the agent finished");
            }

            if let Some(turn) = host.context().turns().last() {
                if !turn.content.is_empty() {
                    println!("{}", turn.content);
                }
            }
            report(host.engine())
        }
    };

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
