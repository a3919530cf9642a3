use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rb_assistant::cli::{self, Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { message, channel, user, model } => {
            init_tracing();
            let (config, _) = cli::load_config()?;
            cli::run::run(&config, message, channel, user, model).await
        }
        Command::Chat { channel, user } => {
            init_cli_tracing();
            let (config, _) = cli::load_config()?;
            cli::chat::chat(&config, channel, user).await
        }
        Command::Summarize { model, id } => {
            init_cli_tracing();
            let (config, _) = cli::load_config()?;
            cli::summarize::summarize(&config, &model, id).await
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _) = cli::load_config()?;
            cli::config::show(&config)
        }
        Command::Config(ConfigCommand::SetSecret) => {
            let (config, _) = cli::load_config()?;
            cli::config::set_secret(&config)
        }
        Command::Version => {
            println!("recordbot {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON tracing on stderr, so stdout only carries the reply.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rb_assistant=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();
}

/// Compact stderr-only tracing for interactive commands.
///
/// Defaults to `warn` so diagnostics do not interleave with the chat.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
