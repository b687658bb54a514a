//! freqsync - TSC frequency node label reconciler
//!
//! Main entry point for the freqsync CLI.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use freqsync::client::{FrequencyCache, KubeClient, NodeCache, Reflector};
use freqsync::config::{validate_config_result, FreqSyncConfig};
use freqsync::node::{parse_frequency_list, Frequency, Node};
use freqsync::topology::{
    build_node_patch, calculate_node_label_changes, filter_nodes, has_invtsc_frequency,
    node_label_diff, required_frequencies, ClusterHinter, Hinter, ScalingPolicy, StaticHinter,
};
use freqsync::updater::{server, NodeTopologyUpdater};
use freqsync::FreqSyncError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::sync::watch;

/// freqsync - Keeps TSC frequency scheduling labels on nodes up to date
#[derive(Parser, Debug)]
#[command(name = "freqsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/freqsync/config.yaml)
    #[arg(short, long, env = "FREQSYNC_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the reconciliation loop against the API server
    Run {
        /// Reconciliation interval in seconds (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Compute patches without submitting them
        #[arg(long)]
        dry_run: bool,

        /// Serve /metrics and /health on this address (overrides config)
        #[arg(long)]
        metrics_addr: Option<String>,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Show the label changes a cycle would make for nodes read from a file
    Plan {
        /// YAML or JSON file with a node list (or a NodeList with `items`)
        #[arg(short, long)]
        nodes: PathBuf,

        /// Frequencies in use, in Hz (comma-separated)
        #[arg(short, long, default_value = "")]
        required: String,

        /// Lowest cluster frequency to assume instead of deriving it from the nodes
        #[arg(long)]
        lowest: Option<Frequency>,

        /// Which required frequencies scalable nodes advertise (overrides config)
        #[arg(long, value_parser = parse_policy)]
        policy: Option<ScalingPolicy>,

        /// Print the merge patch for every node that changes
        #[arg(long)]
        patches: bool,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a default configuration file
    Init,

    /// Print the effective configuration
    Show,
}

/// Node file contents: either a bare list or an API `NodeList`
#[derive(Deserialize)]
#[serde(untagged)]
enum NodesFile {
    List(Vec<Node>),
    NodeList { items: Vec<Node> },
}

impl NodesFile {
    fn into_nodes(self) -> Vec<Node> {
        match self {
            NodesFile::List(nodes) | NodesFile::NodeList { items: nodes } => nodes,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = freqsync::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            interval,
            dry_run,
            metrics_addr,
            once,
        } => {
            let mut config = load_config(&cli.config).context("Failed to load configuration")?;
            if let Some(secs) = interval {
                config.interval_secs = secs;
            }
            if dry_run {
                config.dry_run = true;
            }
            if metrics_addr.is_some() {
                config.metrics_addr = metrics_addr;
            }
            validate_config_result(&config)?;

            handle_run_command(config, once).await
        }

        Commands::Plan {
            nodes,
            required,
            lowest,
            policy,
            patches,
        } => {
            let config = load_config(&cli.config).context("Failed to load configuration")?;
            let policy = policy.unwrap_or(config.scaling_policy);
            handle_plan_command(&nodes, &required, lowest, policy, patches)
        }

        Commands::Config(ConfigCommands::Init) => handle_init_command(&cli.config),

        Commands::Config(ConfigCommands::Show) => {
            let config = load_config(&cli.config).context("Failed to load configuration")?;
            let yaml = serde_yaml::to_string(&config).context("Failed to render configuration")?;
            print!("{}", yaml);
            Ok(())
        }
    }
}

/// Load the config file, falling back to defaults when the default file is absent
fn load_config(config_path: &Option<String>) -> freqsync::Result<FreqSyncConfig> {
    if let Some(path) = config_path {
        return FreqSyncConfig::load(path);
    }

    match FreqSyncConfig::load_default() {
        Ok(config) => Ok(config),
        Err(FreqSyncError::Config(msg)) if msg.contains("Config file not found") => {
            tracing::debug!("No configuration file, using defaults");
            Ok(FreqSyncConfig::new())
        }
        Err(e) => Err(e),
    }
}

async fn handle_run_command(config: FreqSyncConfig, once: bool) -> anyhow::Result<()> {
    let token = config
        .api
        .resolve_token()
        .context("Failed to resolve API token")?;
    let client = Arc::new(
        KubeClient::new(config.api.server.clone(), token, config.api.timeout())
            .context("Failed to build API client")?,
    );

    let nodes = NodeCache::new();
    let in_use = FrequencyCache::new();
    let reflector = Reflector::new(client.clone(), nodes.clone(), in_use.clone())
        .with_resync_interval(config.api.resync_interval());

    // The first cycle must see a populated cache
    reflector
        .refresh()
        .await
        .with_context(|| format!("Initial listing from {} failed", config.api.server))?;
    tracing::info!(nodes = nodes.len(), "Node cache synced");

    let hinter = ClusterHinter::new(Arc::new(nodes.clone()), in_use);
    let mut updater = NodeTopologyUpdater::new(
        config.updater_config(),
        Arc::new(nodes),
        Arc::new(hinter),
        client,
    );

    if once {
        let report = updater.run_cycle().await;
        println!("{}", report.summary());
        return Ok(());
    }

    let (stop_tx, stop_rx) = watch::channel(false);

    let reflector_handle = tokio::spawn(reflector.run(wait_for_stop(stop_rx.clone())));

    let metrics_handle = config.metrics_addr.clone().map(|addr| {
        let stop = wait_for_stop(stop_rx.clone());
        tokio::spawn(async move {
            if let Err(e) = server::serve(&addr, stop).await {
                tracing::error!(error = %e, "Metrics server failed");
            }
        })
    });

    let result = updater
        .run(config.interval(), shutdown_signal())
        .await
        .context("Reconciliation loop failed");

    let _ = stop_tx.send(true);
    if let Err(e) = reflector_handle.await {
        tracing::warn!(error = %e, "Reflector task ended abnormally");
    }
    if let Some(handle) = metrics_handle {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Metrics task ended abnormally");
        }
    }

    result
}

fn handle_plan_command(
    nodes_path: &Path,
    required: &str,
    lowest: Option<Frequency>,
    policy: ScalingPolicy,
    show_patches: bool,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(nodes_path)
        .with_context(|| format!("Failed to read {}", nodes_path.display()))?;
    let file: NodesFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse nodes from {}", nodes_path.display()))?;
    let nodes = file.into_nodes();

    let in_use = parse_frequency_list(required).map_err(|e| anyhow!("--required: {}", e))?;

    let hinter: Box<dyn Hinter> = match lowest {
        Some(lowest) => Box::new(StaticHinter::new(Some(lowest), in_use)),
        None => {
            let cache = NodeCache::new();
            cache.replace_all(nodes.iter().cloned());
            let frequencies = FrequencyCache::new();
            frequencies.replace_all(in_use);
            Box::new(ClusterHinter::new(Arc::new(cache), frequencies))
        }
    };

    let required = required_frequencies(hinter.as_ref());
    let required_hz: Vec<String> = required.iter().map(|f| f.to_string()).collect();
    println!("Required frequencies: [{}]", required_hz.join(", "));
    println!();

    let eligible = filter_nodes(&nodes, &[has_invtsc_frequency]);
    let mut changed = 0;

    for node in &eligible {
        let diff = match node_label_diff(node, &required, policy) {
            Ok(diff) => diff,
            Err(e) => {
                println!("  {:<30} error: {}", node.name(), e);
                continue;
            }
        };

        if diff.is_empty() {
            println!("  {:<30} up to date", node.name());
            continue;
        }

        changed += 1;
        println!("  {}", node.name());
        for label in diff.add_labels() {
            println!("    + {}", label);
        }
        for label in diff.remove_labels() {
            println!("    - {}", label);
        }

        if show_patches {
            let modified = calculate_node_label_changes(node, &required, policy)?;
            if let Some(patch) = build_node_patch(node, &modified)? {
                println!("    patch: {}", patch);
            }
        }
    }

    println!();
    println!(
        "{} eligible of {} nodes, {} would change",
        eligible.len(),
        nodes.len(),
        changed
    );

    Ok(())
}

fn handle_init_command(config_path: &Option<String>) -> anyhow::Result<()> {
    let config_file = if let Some(path) = config_path {
        PathBuf::from(path)
    } else {
        FreqSyncConfig::default_path()
    };

    if config_file.exists() {
        println!("Configuration already exists at {}", config_file.display());
        return Ok(());
    }

    let config = FreqSyncConfig::new();
    config
        .save(&config_file)
        .with_context(|| format!("Failed to write {}", config_file.display()))?;

    println!("✓ Created configuration at {}", config_file.display());
    println!();
    println!("Next steps:");
    println!("  1. Point api.server at your API server and set api.token or api.token_file");
    println!("  2. Preview changes:  freqsync run --once --dry-run");
    println!("  3. Start the loop:   freqsync run");

    Ok(())
}

fn parse_policy(s: &str) -> Result<ScalingPolicy, String> {
    match s.to_lowercase().replace('-', "_").as_str() {
        "at_or_below_native" => Ok(ScalingPolicy::AtOrBelowNative),
        "below_native" => Ok(ScalingPolicy::BelowNative),
        _ => Err(format!(
            "Invalid policy: {}. Must be one of: at_or_below_native, below_native",
            s
        )),
    }
}

/// Resolves once `stop` flips to true (or its sender is gone)
async fn wait_for_stop(mut stop: watch::Receiver<bool>) {
    while !*stop.borrow() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received SIGINT, initiating graceful shutdown");
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    }
                }
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to set up SIGTERM handler");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for SIGINT");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received SIGINT, initiating graceful shutdown");
}
