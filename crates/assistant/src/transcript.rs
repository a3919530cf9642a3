//! Transcript builder: turns stored thread history into the provider
//! message list.

use rb_domain::thread::{MessageType, PartnerId, ThreadMessage};
use rb_domain::tool::{Message, Role};

use crate::prompts;

/// Remove the paragraph markup the host wraps message bodies in.
pub fn strip_markup(body: &str) -> String {
    body.replace("<p>", "").replace("</p>", "").replace('\u{a0}', " ")
}

/// Build the transcript for a conversation.
///
/// `history` is the thread as returned by the store, newest first. The
/// result starts with the system prompt and the greeting, followed by the
/// conversation in chronological order.
pub fn build_transcript(history: &[ThreadMessage], bot_id: PartnerId, greeting: &str) -> Vec<Message> {
    let mut chronological: Vec<&ThreadMessage> = history
        .iter()
        .filter(|m| !m.body.trim().is_empty() || m.message_type.is_function())
        .collect();
    chronological.reverse();

    // The greeting replaces the opening welcome banner.
    if chronological
        .first()
        .is_some_and(|m| m.author_id == bot_id && m.message_type == MessageType::Comment)
    {
        chronological.remove(0);
    }

    let mut out = vec![Message::system(prompts::system_prompt()), Message::assistant(greeting)];
    for msg in chronological {
        let entry = match msg.message_type {
            MessageType::BotFunction | MessageType::BotFunctionRequest => {
                match &msg.function_payload {
                    Some(payload) => payload.clone(),
                    None => {
                        tracing::warn!(message_id = msg.id, "function message without payload dropped");
                        continue;
                    }
                }
            }
            _ if msg.author_id == bot_id => {
                let body = strip_markup(&msg.body);
                if msg.message_type != MessageType::Comment || body == greeting {
                    continue;
                }
                Message::assistant(body)
            }
            _ => Message::user(strip_markup(&msg.body)),
        };
        push_checked(&mut out, entry, msg.id);
    }
    drop_dangling_call(&mut out);
    out
}

/// Append `entry`, keeping every function result directly after the
/// assistant call it answers and every call directly before its result.
fn push_checked(out: &mut Vec<Message>, entry: Message, message_id: u64) {
    if let Some((call_id, name)) = entry.result_target() {
        let answers_previous = out
            .last()
            .and_then(Message::tool_call)
            .is_some_and(|c| c.call_id == call_id && c.tool_name == name);
        if !answers_previous {
            tracing::warn!(message_id, call_id, "orphan function result dropped");
            return;
        }
    } else {
        drop_dangling_call(out);
    }
    out.push(entry);
}

fn drop_dangling_call(out: &mut Vec<Message>) {
    if out
        .last()
        .is_some_and(|m| m.role == Role::Assistant && m.tool_call().is_some())
    {
        tracing::warn!("tool call without result dropped");
        out.pop();
    }
}

/// Text of the last user entry, i.e. the query being answered.
pub fn last_user_query(transcript: &[Message]) -> Option<String> {
    transcript
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.extract_all_text())
}
