//! The slice of the Telegram Bot API the bot speaks.
//!
//! Inbound: `Update` objects posted to the webhook. Outbound: a single method
//! call returned in the webhook response body, which Telegram executes on the
//! bot's behalf.

use crate::chat::UserId;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Clone)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub reply_to_message: Option<Box<Message>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyParameters {
    pub message_id: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "method")]
pub enum BotMethod {
    #[serde(rename = "sendMessage")]
    SendMessage {
        chat_id: i64,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parse_mode: Option<ParseMode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_parameters: Option<ReplyParameters>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_markup: Option<InlineKeyboardMarkup>,
    },
    #[serde(rename = "editMessageText")]
    EditMessageText {
        chat_id: i64,
        message_id: i64,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parse_mode: Option<ParseMode>,
    },
    #[serde(rename = "answerCallbackQuery")]
    AnswerCallbackQuery {
        callback_query_id: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        text: String,
        show_alert: bool,
    },
}

impl BotMethod {
    /// Plain-text reply to `message`.
    pub fn reply(message: &Message, text: impl Into<String>) -> Self {
        BotMethod::SendMessage {
            chat_id: message.chat.id,
            text: text.into(),
            parse_mode: None,
            reply_parameters: Some(ReplyParameters {
                message_id: message.message_id,
            }),
            reply_markup: None,
        }
    }

    pub fn reply_html(
        message: &Message,
        html: impl Into<String>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Self {
        BotMethod::SendMessage {
            chat_id: message.chat.id,
            text: html.into(),
            parse_mode: Some(ParseMode::Html),
            reply_parameters: Some(ReplyParameters {
                message_id: message.message_id,
            }),
            reply_markup: keyboard,
        }
    }

    /// Replaces the text of `message`; the inline keyboard goes away with it.
    pub fn edit_html(message: &Message, html: impl Into<String>) -> Self {
        BotMethod::EditMessageText {
            chat_id: message.chat.id,
            message_id: message.message_id,
            text: html.into(),
            parse_mode: Some(ParseMode::Html),
        }
    }

    pub fn alert(query: &CallbackQuery, text: impl Into<String>) -> Self {
        BotMethod::AnswerCallbackQuery {
            callback_query_id: query.id.clone(),
            text: text.into(),
            show_alert: true,
        }
    }

    /// Silent answer; stops the client's loading indicator on the button.
    pub fn ack(query: &CallbackQuery) -> Self {
        BotMethod::AnswerCallbackQuery {
            callback_query_id: query.id.clone(),
            text: String::new(),
            show_alert: false,
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Clickable mention of a user in HTML parse mode.
pub fn mention_html(user_id: UserId, name: &str) -> String {
    format!("<a href=\"tg://user?id={}\">{}</a>", user_id, escape_html(name))
}
