// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sender filtering and conversion of Telegram updates.

use teloxide::prelude::*;
use teloxide::types::ChatKind;

use tasktally_core::{ChatId, InboundMessage, MessageId};

/// Checks whether the message sender may use the bot.
///
/// An empty `allowed_users` list admits everyone. Otherwise the sender's
/// numeric id or username (with or without `@`, case-insensitive) must be
/// listed. Messages without a sender are never authorized.
pub fn is_authorized(msg: &Message, allowed_users: &[String]) -> bool {
    let Some(user) = msg.from.as_ref() else {
        return false;
    };
    if allowed_users.is_empty() {
        return true;
    }

    let user_id_str = user.id.0.to_string();
    allowed_users.iter().any(|allowed| {
        if *allowed == user_id_str {
            return true;
        }
        let allowed_clean = allowed.strip_prefix('@').unwrap_or(allowed);
        user.username
            .as_deref()
            .is_some_and(|username| username.eq_ignore_ascii_case(allowed_clean))
    })
}

/// Checks whether the message is from a private (DM) chat.
pub fn is_dm(msg: &Message) -> bool {
    matches!(msg.chat.kind, ChatKind::Private(_))
}

/// Converts a text message into an [`InboundMessage`]. Non-text messages
/// yield `None`.
pub fn to_inbound_message(msg: &Message) -> Option<InboundMessage> {
    let text = msg.text()?;
    let sender_name = msg.from.as_ref().map(|u| {
        u.username
            .clone()
            .unwrap_or_else(|| u.first_name.clone())
    });

    Some(InboundMessage {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(i64::from(msg.id.0)),
        sender_name,
        text: text.to_string(),
        reply_to: msg
            .reply_to_message()
            .map(|original| MessageId(i64::from(original.id.0))),
        timestamp: msg.date.to_rfc3339(),
    })
}
