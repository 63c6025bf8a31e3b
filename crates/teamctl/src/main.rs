//! `teamctl`: inspect, replay and sync team hash chains.
//!
//! # Usage
//!
//! ```text
//! teamctl status                                   # summarize the local store
//! teamctl blocks --limit 20                        # list accepted blocks
//! teamctl replay --team-key <b64> chain.json       # verify an exported chain
//! teamctl sync --identity identity.toml            # pull, then ship audit logs
//! teamctl -c teamchain.toml status                 # with a config file
//! ```

mod config;
mod identity;
mod telemetry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use teamchain_store::ChainStore;
use teamchain_sync::{HttpTeamServer, TeamService};
use teamchain_types::{BlockHash, Body, MainChain, PublicKey, SignedMessage};
use teamchain_verify::{TeamState, verify_block, verify_genesis};
use tracing::{error, info};

use config::CliConfig;
use identity::IdentityFile;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "teamctl", version, about = "Team hash chain client")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true, env = "TEAMCHAIN_CONFIG")]
    config: Option<PathBuf>,

    /// Override the store directory.
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the team state held by the local store.
    Status,

    /// List accepted main-chain blocks.
    Blocks {
        /// Start strictly after this block (base64 hash).
        #[arg(long)]
        after: Option<String>,

        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Verify a JSON array of signed messages from genesis.
    Replay {
        /// Initial team public key (base64).
        #[arg(long)]
        team_key: String,

        file: PathBuf,
    },

    /// Pull the main chain from the server, then send unsent audit logs.
    Sync {
        /// Identity file (seed, email, team key, checkpoint).
        #[arg(short, long)]
        identity: PathBuf,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = dir;
    }

    telemetry::init(&config.log.level);

    match cli.command {
        Commands::Status => cmd_status(&config),
        Commands::Blocks { after, limit } => cmd_blocks(&config, after.as_deref(), limit),
        Commands::Replay { team_key, file } => cmd_replay(&team_key, &file),
        Commands::Sync { identity } => cmd_sync(&config, &identity),
    }
}

fn open_store(config: &CliConfig) -> Result<ChainStore> {
    if config.store.memory {
        return Ok(ChainStore::in_memory());
    }
    let path = &config.store.data_dir;
    std::fs::create_dir_all(path)
        .with_context(|| format!("cannot create store directory {}", path.display()))?;
    ChainStore::open(path).map_err(|e| {
        error!(path = %path.display(), %e, "failed to open chain store");
        anyhow::anyhow!("cannot open chain store at {} ({e})", path.display())
    })
}

// -----------------------------------------------------------------------
// teamctl status
// -----------------------------------------------------------------------

fn cmd_status(config: &CliConfig) -> Result<()> {
    let store = open_store(config)?;
    let Some(state) = store.team_state()? else {
        println!("No team chain in {}", config.store.data_dir.display());
        return Ok(());
    };
    print_state(&state);

    let unsent = store.unsent_audit_logs()?;
    match store.log_state()? {
        Some(log) => println!(
            "Audit log: {} blocks, tip {}",
            log.block_count,
            log.last_block_hash.to_base64()
        ),
        None => println!("Audit log: not started"),
    }
    println!("Unsent audit records: {}", unsent.len());
    Ok(())
}

fn print_state(state: &TeamState) {
    println!("Team: {} ({})", state.info.name, state.team_public_key.to_base64());
    println!(
        "Blocks: {}, tip {}",
        state.block_count,
        state.last_block_hash.to_base64()
    );
    println!("Members: {}", state.members.len());
    for (key, member) in &state.members {
        let role = if state.is_admin(key) { "admin" } else { "member" };
        println!("  {} {} {role}", key.to_base64(), member.email);
    }
    if !state.invitations.is_empty() {
        println!("Pending invitations: {}", state.invitations.len());
    }
    if !state.pinned_hosts.is_empty() {
        println!("Pinned hosts:");
        for host in &state.pinned_hosts {
            println!("  {}", host.host);
        }
    }
    println!(
        "Logging: {}",
        if state.logging_enabled() { "enabled" } else { "disabled" }
    );
}

// -----------------------------------------------------------------------
// teamctl blocks
// -----------------------------------------------------------------------

fn cmd_blocks(config: &CliConfig, after: Option<&str>, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let after = parse_after(after)?;

    let blocks = store.fetch_blocks(after.as_ref(), limit)?;
    for block in &blocks {
        println!("{}", block_line(block));
    }
    if blocks.is_empty() {
        println!("No blocks.");
    }
    Ok(())
}

/// `--after` takes the hash exactly as `blocks` prints it.
fn parse_after(after: Option<&str>) -> Result<Option<BlockHash>> {
    after
        .map(BlockHash::from_base64)
        .transpose()
        .context("invalid --after hash")
}

fn block_line(block: &SignedMessage) -> String {
    format!(
        "{} {} {}",
        block.hash().to_base64(),
        signer_label(block),
        describe(block)
    )
}

fn signer_label(block: &SignedMessage) -> String {
    block
        .signer()
        .map(|key| key.to_base64())
        .unwrap_or_else(|_| "<bad key>".to_string())
}

fn describe(block: &SignedMessage) -> String {
    match block.decode_message() {
        Ok(message) => match message.body {
            Body::Main(MainChain::Create(genesis)) => format!("create {}", genesis.team_info.name),
            Body::Main(MainChain::Append(append)) => append.operation.kind().to_string(),
            _ => "other".to_string(),
        },
        Err(e) => format!("undecodable: {e}"),
    }
}

// -----------------------------------------------------------------------
// teamctl replay
// -----------------------------------------------------------------------

fn cmd_replay(team_key: &str, file: &Path) -> Result<()> {
    let team_key = PublicKey::from_base64(team_key).context("invalid --team-key")?;
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let blocks: Vec<SignedMessage> =
        serde_json::from_str(&content).context("expected a JSON array of signed messages")?;

    let store = ChainStore::in_memory();
    let mut tx = store.begin()?;
    for (index, block) in blocks.iter().enumerate() {
        let applied = match tx.team_state() {
            None => verify_genesis(block, &team_key),
            Some(state) => verify_block(block, state),
        };
        let applied = match applied {
            Ok(applied) => applied,
            Err(rejection) => {
                println!(
                    "Block {index} ({}) rejected: {rejection}",
                    block.hash().to_base64()
                );
                anyhow::bail!("chain does not verify");
            }
        };
        let tip = tx.last_block_hash();
        tx.append_block(tip, block)?;
        tx.set_team_state(applied.state);
    }
    tx.commit()?;

    match store.team_state()? {
        Some(state) => print_state(&state),
        None => println!("Empty chain."),
    }
    Ok(())
}

// -----------------------------------------------------------------------
// teamctl sync
// -----------------------------------------------------------------------

fn cmd_sync(config: &CliConfig, identity: &Path) -> Result<()> {
    let identity = IdentityFile::load(identity)?.into_identity()?;
    let server = HttpTeamServer::with_timeout(config.server.url.clone(), config.timeout())
        .context("failed to build HTTP client")?;
    let service = TeamService::new(identity, open_store(config)?, Arc::new(server))
        .with_config(config.sync_config());

    let state = service
        .get_verified_team_updates()
        .context("failed to pull team chain")?;
    info!(blocks = state.block_count, tip = %state.last_block_hash, "team chain up to date");

    if state.logging_enabled() {
        let sent = service
            .send_unsent_log_blocks()
            .context("failed to send audit logs")?;
        info!(sent, "audit logs shipped");
    }
    print_state(&state);
    Ok(())
}
