use crate::chat::UserId;
use crate::telegram::{mention_html, Update, User};
use std::collections::HashMap;

/// Display names learned from the updates the bot has seen.
///
/// The webhook never calls back into the Bot API, so a user is only known by
/// name once they have written something (or been replied to) since startup.
/// Unknown users are mentioned by their numeric id.
///
/// Names live in memory only. Marriages survive a restart but their names do
/// not: `браки` shows ids for every pair until its members write again.
#[derive(Debug, Default)]
pub struct Directory {
    names: HashMap<UserId, String>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&mut self, user: &User) {
        self.names.insert(user.id, user.full_name());
    }

    pub fn observe(&mut self, update: &Update) {
        if let Some(message) = &update.message {
            if let Some(from) = &message.from {
                self.remember(from);
            }
            if let Some(from) = message.reply_to_message.as_ref().and_then(|m| m.from.as_ref()) {
                self.remember(from);
            }
        }
        if let Some(query) = &update.callback_query {
            self.remember(&query.from);
        }
    }

    pub fn name(&self, user_id: UserId) -> Option<&str> {
        self.names.get(&user_id).map(String::as_str)
    }

    pub fn mention(&self, user_id: UserId) -> String {
        match self.name(user_id) {
            Some(name) => mention_html(user_id, name),
            None => mention_html(user_id, &user_id.to_string()),
        }
    }
}
