//! One-shot management CLI.
//!
//! Works directly on the store named by the config file. No live core is
//! attached, so saves are committed here and applied to the core by the
//! daemon's change follower.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use proxy_control::config::load_config;
use proxy_control::core::DetachedCore;
use proxy_control::engine::{Action, ChangeQuery, Engine, ObjectClass, SaveRequest};
use proxy_control::lifecycle::build_engine;
use proxy_control::observability::logging;
use proxy_control::ControlConfig;

#[derive(Parser)]
#[command(name = "control-cli")]
#[command(about = "Management CLI for the proxy control plane", long_about = None)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "config/control.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply one mutating request
    Save {
        /// Object class (clients, tls, inbounds, outbounds, endpoints, settings, config)
        #[arg(long)]
        class: ObjectClass,
        /// Action (new, edit, del, addbulk)
        #[arg(long)]
        action: Action,
        /// JSON payload; `-` reads it from stdin
        #[arg(long)]
        payload: String,
        #[arg(long, default_value = "cli")]
        actor: String,
        /// Client ids to link to a new inbound
        #[arg(long, value_delimiter = ',')]
        init_users: Vec<i64>,
    },
    /// List change records, newest first
    Changes {
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        /// Delete every change record instead
        #[arg(long)]
        reset: bool,
    },
    /// Report whether anything changed after a watermark (unix ms)
    Check { since: Option<String> },
    /// Print the full core document
    Assemble {
        /// Base document to use instead of the stored one
        #[arg(long)]
        base: Option<PathBuf>,
    },
    /// Print all settings with defaults filled in
    Settings {
        /// Clear every stored setting instead
        #[arg(long)]
        reset: bool,
    },
    /// Disable depleted clients now
    Sweep,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_payload(arg: String) -> std::io::Result<String> {
    if arg != "-" {
        return Ok(arg);
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn open_engine(config: &Path) -> Result<Engine, Box<dyn std::error::Error>> {
    let config = if config.exists() {
        load_config(config)?
    } else {
        ControlConfig::default()
    };
    if let Err(e) = logging::init(&config.observability.log_level) {
        eprintln!("logging disabled: {e}");
    }
    Ok(build_engine(&config, Arc::new(DetachedCore))?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let engine = open_engine(&cli.config)?;

    match cli.command {
        Commands::Save {
            class,
            action,
            payload,
            actor,
            init_users,
        } => {
            let request = SaveRequest::new(class, action, read_payload(payload)?, actor)
                .with_init_users(init_users);
            print_json(&engine.save(request)?)?;
        }
        Commands::Changes {
            actor,
            class,
            limit,
            reset,
        } => {
            if reset {
                print_json(&json!({ "cleared": engine.reset_changes()? }))?;
            } else {
                print_json(&engine.changes(&ChangeQuery { actor, class, limit })?)?;
            }
        }
        Commands::Check { since } => {
            print_json(&json!({ "changed": engine.check_changes(since.as_deref())? }))?;
        }
        Commands::Assemble { base } => {
            let base = base.map(std::fs::read_to_string).transpose()?;
            print_json(&engine.assemble(base.as_deref())?)?;
        }
        Commands::Settings { reset } => {
            if reset {
                print_json(&json!({ "cleared": engine.reset_settings()? }))?;
            } else {
                print_json(&engine.settings()?)?;
            }
        }
        Commands::Sweep => print_json(&engine.deplete_clients()?)?,
    }

    Ok(())
}
