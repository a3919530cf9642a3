//! `recordbot chat`: interactive REPL.
//!
//! Each line is posted into a private chat with the bot and answered the
//! same way a host message would be. Slash commands reset the
//! conversation or switch the model tier for the session.

use rb_domain::config::{Config, ModelTier};
use rb_domain::thread::{IncomingMessage, NewMessage, ThreadInfo, ThreadTarget};
use rb_threads::ThreadStore;

use crate::bootstrap::{self, Runtime};
use crate::cli::cli_channel;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(config: &Config, channel: String, user: i64) -> anyhow::Result<()> {
    let rt = bootstrap::build_runtime(config)?;
    let target = cli_channel(&channel, user, config.assistant.bot_id);
    let mut tier = config.assistant.model_for(user);

    let history_path = config.storage.threads_dir.join(".chat_history");
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("RecordBot interactive chat");
    eprintln!("Channel: {channel}  |  Model: {}  |  Type /help for commands, Ctrl+D to exit", tier.label());
    eprintln!();

    if rt.assistant.ensure_welcome(&target).await? {
        println!("bot> {}", config.assistant.welcome);
    }

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    match handle_slash_command(trimmed, &rt, &target, &mut tier).await {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
                    }
                    continue;
                }

                if let Err(e) = send_message(&rt, &target, user, tier, trimmed).await {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    rt.persist()?;
    eprintln!("Goodbye!");
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process a slash command. Returns `true` if the REPL should exit.
async fn handle_slash_command(
    input: &str,
    rt: &Runtime,
    target: &ThreadTarget,
    tier: &mut ModelTier,
) -> anyhow::Result<bool> {
    let (cmd, arg) = match input.split_once(' ') {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (input, ""),
    };

    match cmd {
        "/exit" | "/quit" => return Ok(true),

        "/reset" => {
            let reply = rt.assistant.reset(target).await?;
            eprintln!("Conversation cleared.");
            println!("bot> {}", reply.body);
        }

        "/model" => {
            if arg.is_empty() {
                eprintln!("Current model: {} ({tier})", tier.label());
                eprintln!("Usage: /model <4k|16k|8k|model id>");
            } else {
                match arg.parse::<ModelTier>() {
                    Ok(t) => {
                        *tier = t;
                        eprintln!("Model set to: {} ({t})", t.label());
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
        }

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /model <tier>    Switch model (4k, 16k or 8k)");
            eprintln!("  /reset           Clear the conversation");
            eprintln!("  /exit, /quit     Exit the chat");
            eprintln!("  /help            Show this help");
        }

        other => eprintln!("Unknown command: {other}  (type /help for a list)"),
    }
    Ok(false)
}

async fn send_message(
    rt: &Runtime,
    target: &ThreadTarget,
    user: i64,
    tier: ModelTier,
    text: &str,
) -> anyhow::Result<()> {
    rt.threads
        .post_message(target, NewMessage::comment(text, user))
        .await?;

    let incoming = IncomingMessage::comment(user, text);
    let reply = rt
        .assistant
        .handle_message_with(&ThreadInfo::single(target.clone()), &incoming, tier)
        .await?;
    if let Some(reply) = reply {
        println!("bot> {}", reply.body);
    }
    Ok(())
}
