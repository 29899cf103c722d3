//! Field node daemon.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use fieldnode_network::UdpFace;
use fieldnode_node::{
    init_logging, platform_serial, Config, IotNode, LogFormat, NodeConfig, NodeMetrics,
    NodeOptions,
};
use fieldnode_security::{
    FileIdentityStorage, FilePrivateKeyStorage, KeyChain, SignatureService, TrustPolicy,
};
use fieldnode_types::{Data, Interest};

type FileKeyChain = KeyChain<FileIdentityStorage, FilePrivateKeyStorage>;

#[derive(Parser)]
#[command(name = "fieldnode", about = "NDN field node daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Bootstrap into the environment and serve commands.
    Run {
        /// Path to the TOML configuration file.
        #[arg(long, env = "FIELDNODE_CONFIG")]
        config: PathBuf,

        /// Log filter, e.g. "info" or "debug,fieldnode_node=trace".
        #[arg(long, env = "FIELDNODE_LOG_LEVEL")]
        log_level: Option<String>,

        /// Log format: "human" or "json".
        #[arg(long, env = "FIELDNODE_LOG_FORMAT")]
        log_format: Option<String>,

        /// Address of the local forwarder.
        #[arg(long, env = "FIELDNODE_FORWARDER")]
        forwarder: Option<SocketAddr>,

        /// Keep Prometheus metrics and log them on shutdown.
        #[arg(long, env = "FIELDNODE_ENABLE_METRICS")]
        metrics: bool,
    },
    /// Print the platform serial number.
    Serial,
    /// Print the device prefix, key and certificate.
    Identity {
        #[arg(long, env = "FIELDNODE_CONFIG")]
        config: PathBuf,

        /// Print a JSON object instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            log_level,
            log_format,
            forwarder,
            metrics,
        } => {
            let mut config = load_config(&config)?;
            let settings = &mut config.node;
            if let Some(level) = log_level {
                settings.log_level = level;
            }
            if let Some(format) = log_format {
                settings.log_format = format;
            }
            if let Some(forwarder) = forwarder {
                settings.forwarder = forwarder;
            }
            settings.enable_metrics |= metrics;
            run(config).await
        }
        Command::Serial => {
            println!("{}", platform_serial()?);
            Ok(())
        }
        Command::Identity { config, json } => {
            let config = load_config(&config)?;
            let prefix = config.device_prefix(platform_serial)?;
            let policy = config.trust_policy()?;
            let mut keychain = open_keychain(&config.node, policy.clone())?;
            let certificate = keychain.ensure_identity(&prefix)?;
            let storage = keychain.storage();
            let key = storage.default_key_name_for_identity(&prefix)?;
            let certified = policy.has_accepted_root_certificate(storage);
            if json {
                let report = serde_json::json!({
                    "prefix": prefix.to_uri(),
                    "key": key.to_uri(),
                    "certificate": certificate.to_uri(),
                    "certified": certified,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("prefix:      {prefix}");
                println!("key:         {key}");
                println!("certificate: {certificate}");
                println!("certified:   {certified}");
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::from_toml_file(path).with_context(|| format!("loading {}", path.display()))
}

fn open_keychain(settings: &NodeConfig, policy: TrustPolicy) -> anyhow::Result<FileKeyChain> {
    if let Some(parent) = settings.identity_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let identities = FileIdentityStorage::open(&settings.identity_file)?;
    let keys = FilePrivateKeyStorage::open(&settings.key_dir)?;
    let mut keychain = KeyChain::new(identities, keys, policy);

    if let Some(directory) = &settings.trust_anchor_dir {
        keychain = keychain.with_anchor_directory(directory);
        match keychain.load_trust_anchors(directory) {
            Ok(count) => {
                tracing::info!(count, directory = %directory.display(), "trust anchors loaded")
            }
            Err(e) => tracing::warn!(
                error = %e,
                directory = %directory.display(),
                "trust anchors not loaded"
            ),
        }
    }
    Ok(keychain)
}

fn ping(interest: &Interest) -> Data {
    Data::new(interest.name.clone()).with_content(b"pong".to_vec())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let format: LogFormat = config.node.log_format()?;
    let log_level = init_logging(format, &config.node.log_level)?;

    let prefix = config.device_prefix(platform_serial)?;
    let policy = config.trust_policy()?;
    let table = config.command_table()?;

    let mut keychain = open_keychain(&config.node, policy.clone())?;
    let certificate = keychain.ensure_identity(&prefix)?;
    tracing::info!(%prefix, %certificate, commands = table.len(), "device identity ready");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let face = UdpFace::connect(config.node.forwarder, events_tx)
        .await
        .with_context(|| format!("connecting to forwarder at {}", config.node.forwarder))?;

    let mut node = IotNode::new(
        prefix,
        policy,
        table,
        face,
        keychain,
        NodeOptions::from(&config.node),
    )
    .with_log_level_handle(log_level);
    if config.node.enable_metrics {
        node = node.with_metrics(NodeMetrics::new()?);
    }
    node.register_handler("doPing", ping);
    node.on_setup_complete(|context| {
        tracing::info!(
            prefix = %context.prefix,
            trust_root = %context.trust_root,
            "setup complete, serving commands"
        );
    });

    let shutdown = node.shutdown_controller().clone();
    tokio::spawn(async move { shutdown.wait_for_signal().await });

    let result = node.run(events_rx).await;
    if let Some(metrics) = node.metrics() {
        match metrics.render() {
            Ok(text) => tracing::info!(metrics = %text, "final metrics"),
            Err(e) => tracing::warn!(error = %e, "metrics not rendered"),
        }
    }
    result?;
    tracing::info!("node stopped");
    Ok(())
}
