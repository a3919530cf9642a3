pub mod chat;
pub mod config;
pub mod run;
pub mod summarize;

use clap::{Parser, Subcommand};

/// RecordBot: an assistant that reads and edits business records from
/// chat.
#[derive(Debug, Parser)]
#[command(name = "recordbot", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a single message to the assistant and print the reply.
    Run {
        /// The message to send.
        message: String,
        /// Conversation channel id.
        #[arg(long, default_value = "cli")]
        channel: String,
        /// Partner id the message is sent as.
        #[arg(long, default_value_t = 3)]
        user: i64,
        /// Model tier override ("4k", "16k", "8k" or a model id).
        #[arg(long)]
        model: Option<String>,
    },
    /// Interactive chat with the assistant.
    Chat {
        /// Conversation channel id.
        #[arg(long, default_value = "cli")]
        channel: String,
        /// Partner id the messages are sent as.
        #[arg(long, default_value_t = 3)]
        user: i64,
    },
    /// Summarize one record.
    Summarize {
        /// Technical model name, e.g. `sale.order`.
        model: String,
        /// Record id.
        id: i64,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
    /// Store the provider API key in the OS keychain.
    SetSecret,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `RB_CONFIG` (or `config.toml`
/// by default). A missing file yields the defaults. Returns the parsed
/// config and the path that was used.
pub fn load_config() -> anyhow::Result<(rb_domain::config::Config, String)> {
    let config_path = std::env::var("RB_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        rb_domain::config::Config::default()
    };

    Ok((config, config_path))
}

/// The private chat the CLI talks in: the user and the bot.
pub(crate) fn cli_channel(id: &str, user: i64, bot_id: i64) -> rb_domain::thread::ThreadTarget {
    rb_domain::thread::ThreadTarget::Channel {
        id: id.to_owned(),
        kind: rb_domain::thread::ChannelKind::Chat,
        member_ids: vec![user, bot_id],
    }
}
