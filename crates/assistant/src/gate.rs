//! Trigger gate: decides whether an incoming message is addressed to the
//! assistant.

use rb_domain::thread::{ChannelKind, IncomingMessage, MessageType, PartnerId, ThreadInfo, ThreadTarget};

/// `true` when the assistant should answer `msg`.
///
/// Fires when the bot is mentioned, or when the thread is a private chat
/// the bot is a member of. Never fires when the lookup did not resolve to
/// exactly one thread, when the bot wrote the message itself, or for
/// non-comment messages that carry no explicit command.
pub fn should_respond(msg: &IncomingMessage, thread: &ThreadInfo, bot_id: PartnerId) -> bool {
    if thread.matched_records != 1 || msg.author_id == bot_id {
        return false;
    }
    if msg.message_type != MessageType::Comment && msg.command.is_none() {
        return false;
    }
    msg.recipient_ids.contains(&bot_id) || is_private_chat_with(&thread.target, bot_id)
}

fn is_private_chat_with(target: &ThreadTarget, bot_id: PartnerId) -> bool {
    matches!(
        target,
        ThreadTarget::Channel { kind: ChannelKind::Chat, member_ids, .. } if member_ids.contains(&bot_id)
    )
}
