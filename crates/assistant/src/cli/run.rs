//! `recordbot run`: send one message, print the reply and exit.

use rb_domain::config::{Config, ModelTier};
use rb_domain::thread::{IncomingMessage, NewMessage, ThreadInfo};
use rb_threads::ThreadStore;

use crate::bootstrap;
use crate::cli::cli_channel;

pub async fn run(
    config: &Config,
    message: String,
    channel: String,
    user: i64,
    model: Option<String>,
) -> anyhow::Result<()> {
    let rt = bootstrap::build_runtime(config)?;
    let bot_id = config.assistant.bot_id;
    let target = cli_channel(&channel, user, bot_id);

    let tier = match model {
        Some(m) => m.parse::<ModelTier>().map_err(anyhow::Error::msg)?,
        None => config.assistant.model_for(user),
    };

    rt.assistant.ensure_welcome(&target).await?;
    rt.threads
        .post_message(&target, NewMessage::comment(message.clone(), user))
        .await?;

    let incoming = IncomingMessage::comment(user, message);
    let reply = rt
        .assistant
        .handle_message_with(&ThreadInfo::single(target), &incoming, tier)
        .await?;

    match reply {
        Some(reply) => println!("{}", reply.body),
        None => eprintln!("(no reply)"),
    }

    rt.persist()
}
