use crate::chat::chat_key;
use crate::directory::Directory;
use crate::duration::format_duration;
use crate::store::Store;
use crate::telegram::{
    BotMethod, CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update,
};
use crate::workflow::{Action, Affordance, Proposal, Resolution, Workflow, WorkflowError};
use tracing::{debug, error, warn};

const PROPOSE: &str = "брак";
const LIST: &str = "браки";
const DIVORCE: &str = "развод";

/// Turns webhook updates into at most one Bot API call each.
pub struct Dispatcher<S> {
    workflow: Workflow<S>,
    directory: Directory,
}

impl<S: Store> Dispatcher<S> {
    pub fn new(workflow: Workflow<S>) -> Self {
        Dispatcher {
            workflow,
            directory: Directory::new(),
        }
    }

    #[cfg(test)]
    pub fn workflow(&self) -> &Workflow<S> {
        &self.workflow
    }

    pub fn handle(&mut self, update: &Update) -> Option<BotMethod> {
        self.directory.observe(update);

        if let Some(message) = &update.message {
            return self.on_message(message);
        }
        if let Some(query) = &update.callback_query {
            return self.on_callback(query);
        }
        debug!(update_id = update.update_id, "ignoring update");
        None
    }

    fn on_message(&self, message: &Message) -> Option<BotMethod> {
        let text = message.text.as_deref()?.to_lowercase();
        if text.starts_with('/') {
            return None;
        }
        let sender = message.from.as_ref()?;
        let chat = chat_key(message.chat.id);

        if text.starts_with(PROPOSE) {
            if let Some(replied) = &message.reply_to_message {
                let target = replied.from.as_ref()?;
                return Some(match self.workflow.propose(&chat, sender.id, target.id) {
                    Ok(proposal) => self.proposal_message(message, proposal),
                    Err(e) => self.rejection(message, e),
                });
            }
        }

        if text == LIST {
            return Some(match self.workflow.list(&chat) {
                Ok(marriages) => {
                    let lines: Vec<String> = marriages
                        .iter()
                        .enumerate()
                        .map(|(i, m)| {
                            format!(
                                "{}. {} + {} ({})",
                                i + 1,
                                self.directory.mention(m.users[0]),
                                self.directory.mention(m.users[1]),
                                format_duration(m.elapsed)
                            )
                        })
                        .collect();
                    BotMethod::reply_html(message, lines.join("\n"), None)
                }
                Err(e) => self.rejection(message, e),
            });
        }

        if text == DIVORCE {
            return Some(match self.workflow.divorce(&chat, sender.id) {
                Ok(divorce) => BotMethod::reply_html(
                    message,
                    format!(
                        "💔 {} и {} развелись.",
                        self.directory.mention(divorce.caller),
                        self.directory.mention(divorce.partner)
                    ),
                    None,
                ),
                Err(e) => self.rejection(message, e),
            });
        }

        None
    }

    /// A webhook reply carries one method. When the press resolves, that
    /// method is the edit and the button's loading indicator runs until the
    /// client times it out; presses that change nothing are acknowledged.
    fn on_callback(&self, query: &CallbackQuery) -> Option<BotMethod> {
        let Some(data) = query.data.as_deref() else {
            return Some(BotMethod::ack(query));
        };
        let affordance: Affordance = match data.parse() {
            Ok(affordance) => affordance,
            Err(e) => {
                warn!(data, error = %e, "ignoring malformed callback data");
                return Some(BotMethod::ack(query));
            }
        };
        let Some(message) = query.message.as_ref() else {
            return Some(BotMethod::ack(query));
        };
        let chat = chat_key(message.chat.id);

        match self.workflow.respond(&chat, query.from.id, affordance) {
            Ok(Resolution::Married(record)) => Some(BotMethod::edit_html(
                message,
                format!(
                    "🎉 {} и {} теперь в браке! 🥰",
                    self.directory.mention(record.users[0]),
                    self.directory.mention(record.users[1])
                ),
            )),
            Ok(Resolution::Declined { proposer, target }) => Some(BotMethod::edit_html(
                message,
                format!(
                    "❌ {} отклонил предложение брака от {}.",
                    self.directory.mention(target),
                    self.directory.mention(proposer)
                ),
            )),
            Err(e) => Some(BotMethod::alert(query, rejection_text(&e))),
        }
    }

    fn proposal_message(&self, message: &Message, proposal: Proposal) -> BotMethod {
        let button = |text: &str, action| InlineKeyboardButton {
            text: text.into(),
            callback_data: proposal.affordance(action).to_string(),
        };
        let keyboard = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![
                button("Согласиться 💍", Action::Accept),
                button("Отклонить ❌", Action::Decline),
            ]],
        };
        BotMethod::reply_html(
            message,
            format!(
                "{}, {} предлагает вам вступить в брак! 🥰",
                self.directory.mention(proposal.target),
                self.directory.mention(proposal.proposer)
            ),
            Some(keyboard),
        )
    }

    fn rejection(&self, message: &Message, e: WorkflowError) -> BotMethod {
        BotMethod::reply(message, rejection_text(&e))
    }
}

fn rejection_text(e: &WorkflowError) -> &'static str {
    match e {
        WorkflowError::SelfMarriage => "Вы не можете заключить брак сами с собой!",
        WorkflowError::AlreadyMarried => "Один из вас уже в браке!",
        WorkflowError::UnauthorizedAction { .. } => "Вы не можете взаимодействовать с этой кнопкой.",
        WorkflowError::NotMarried => "Вы не состоите в браке!",
        WorkflowError::ChatNotFound => "В этом чате пока нет браков.",
        WorkflowError::Store(e) => {
            error!(error = %e, "marriage store failure");
            "Не удалось прочитать данные о браках. Попробуйте позже."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::store::{JsonFileStore, MemoryStore};
    use serde_json::{json, Value};

    const CHAT: i64 = -1001;

    fn dispatcher() -> Dispatcher<MemoryStore> {
        let registry = Registry::with_clock(MemoryStore::new(), Box::new(|| 10_000.0));
        Dispatcher::new(Workflow::new(registry))
    }

    fn user(id: i64, name: &str) -> Value {
        json!({"id": id, "is_bot": false, "first_name": name})
    }

    fn text_update(from: Value, text: &str, reply_to: Option<Value>) -> Update {
        let mut message = json!({
            "message_id": 100,
            "date": 0,
            "chat": {"id": CHAT, "type": "group"},
            "from": from,
            "text": text,
        });
        if let Some(author) = reply_to {
            message["reply_to_message"] = json!({
                "message_id": 99,
                "date": 0,
                "chat": {"id": CHAT, "type": "group"},
                "from": author,
                "text": "...",
            });
        }
        serde_json::from_value(json!({"update_id": 1, "message": message})).unwrap()
    }

    fn callback_update(from: Value, data: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb-1",
                "from": from,
                "chat_instance": "x",
                "data": data,
                "message": {
                    "message_id": 101,
                    "date": 0,
                    "chat": {"id": CHAT, "type": "group"},
                    "text": "proposal"
                }
            }
        }))
        .unwrap()
    }

    fn body(method: Option<BotMethod>) -> Value {
        serde_json::to_value(method.expect("expected a reply")).unwrap()
    }

    #[test]
    fn test_proposal_carries_buttons() {
        let mut dispatcher = dispatcher();
        let reply = body(dispatcher.handle(&text_update(
            user(10, "Анна"),
            "Брак!",
            Some(user(20, "Иван")),
        )));

        assert_eq!(reply["method"], "sendMessage");
        assert_eq!(reply["chat_id"], CHAT);
        assert_eq!(reply["parse_mode"], "HTML");
        assert_eq!(reply["reply_parameters"]["message_id"], 100);
        assert_eq!(
            reply["text"],
            "<a href=\"tg://user?id=20\">Иван</a>, <a href=\"tg://user?id=10\">Анна</a> предлагает вам вступить в брак! 🥰"
        );
        let buttons = &reply["reply_markup"]["inline_keyboard"][0];
        assert_eq!(buttons[0]["callback_data"], "accept|10|20");
        assert_eq!(buttons[1]["callback_data"], "decline|10|20");
    }

    #[test]
    fn test_propose_without_reply_is_ignored() {
        let mut dispatcher = dispatcher();
        assert!(dispatcher.handle(&text_update(user(10, "Анна"), "брак", None)).is_none());
        assert!(dispatcher.handle(&text_update(user(10, "Анна"), "/брак", Some(user(20, "Иван")))).is_none());
        assert!(dispatcher.handle(&text_update(user(10, "Анна"), "привет", None)).is_none());
    }

    #[test]
    fn test_self_proposal_rejected() {
        let mut dispatcher = dispatcher();
        let reply = body(dispatcher.handle(&text_update(
            user(10, "Анна"),
            "брак",
            Some(user(10, "Анна")),
        )));
        assert_eq!(reply["text"], "Вы не можете заключить брак сами с собой!");
        assert!(reply.get("parse_mode").is_none());
    }

    #[test]
    fn test_accept_list_divorce() {
        let mut dispatcher = dispatcher();
        dispatcher.handle(&text_update(user(10, "Анна"), "брак", Some(user(20, "Иван"))));

        let accepted = body(dispatcher.handle(&callback_update(user(20, "Иван"), "accept|10|20")));
        assert_eq!(accepted["method"], "editMessageText");
        assert_eq!(accepted["message_id"], 101);
        assert_eq!(
            accepted["text"],
            "🎉 <a href=\"tg://user?id=10\">Анна</a> и <a href=\"tg://user?id=20\">Иван</a> теперь в браке! 🥰"
        );

        let again = body(dispatcher.handle(&text_update(user(30, "Олег"), "брак", Some(user(20, "Иван")))));
        assert_eq!(again["text"], "Один из вас уже в браке!");

        let listed = body(dispatcher.handle(&text_update(user(30, "Олег"), "Браки", None)));
        assert_eq!(
            listed["text"],
            "1. <a href=\"tg://user?id=10\">Анна</a> + <a href=\"tg://user?id=20\">Иван</a> (0 часов 0 минут 0 секунд)"
        );

        let divorced = body(dispatcher.handle(&text_update(user(10, "Анна"), "развод", None)));
        assert_eq!(
            divorced["text"],
            "💔 <a href=\"tg://user?id=10\">Анна</a> и <a href=\"tg://user?id=20\">Иван</a> развелись."
        );

        let empty = body(dispatcher.handle(&text_update(user(30, "Олег"), "браки", None)));
        assert_eq!(empty["text"], "В этом чате пока нет браков.");

        let not_married = body(dispatcher.handle(&text_update(user(10, "Анна"), "развод", None)));
        assert_eq!(not_married["text"], "Вы не состоите в браке!");
    }

    #[test]
    fn test_decline_edits_message() {
        let mut dispatcher = dispatcher();
        dispatcher.handle(&text_update(user(10, "Анна"), "брак", Some(user(20, "Иван"))));
        let declined = body(dispatcher.handle(&callback_update(user(20, "Иван"), "decline|10|20")));
        assert_eq!(
            declined["text"],
            "❌ <a href=\"tg://user?id=20\">Иван</a> отклонил предложение брака от <a href=\"tg://user?id=10\">Анна</a>."
        );
        assert!(dispatcher.workflow().registry().marriages("-1001").unwrap().is_empty());
    }

    #[test]
    fn test_stranger_gets_alert() {
        let mut dispatcher = dispatcher();
        let alert = body(dispatcher.handle(&callback_update(user(30, "Олег"), "accept|10|20")));
        assert_eq!(alert["method"], "answerCallbackQuery");
        assert_eq!(alert["callback_query_id"], "cb-1");
        assert_eq!(alert["show_alert"], true);
        assert_eq!(alert["text"], "Вы не можете взаимодействовать с этой кнопкой.");
        assert!(dispatcher.workflow().registry().marriages("-1001").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_callback_is_acknowledged() {
        let mut dispatcher = dispatcher();
        let ack = body(dispatcher.handle(&callback_update(user(20, "Иван"), "accept|10")));
        assert_eq!(ack, json!({"method": "answerCallbackQuery", "callback_query_id": "cb-1", "show_alert": false}));
        assert!(dispatcher.workflow().registry().marriages("-1001").unwrap().is_empty());
    }

    #[test]
    fn test_names_are_relearned_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"-1001": [{"users": [10, 20], "start_time": 10000}]}"#).unwrap();
        let registry = Registry::with_clock(JsonFileStore::new(&path), Box::new(|| 10_000.0));
        let mut dispatcher = Dispatcher::new(Workflow::new(registry));

        let listed = body(dispatcher.handle(&text_update(user(30, "Олег"), "браки", None)));
        assert_eq!(
            listed["text"],
            "1. <a href=\"tg://user?id=10\">10</a> + <a href=\"tg://user?id=20\">20</a> (0 часов 0 минут 0 секунд)"
        );

        dispatcher.handle(&text_update(user(10, "Анна"), "привет", None));
        let listed = body(dispatcher.handle(&text_update(user(30, "Олег"), "браки", None)));
        assert_eq!(
            listed["text"],
            "1. <a href=\"tg://user?id=10\">Анна</a> + <a href=\"tg://user?id=20\">20</a> (0 часов 0 минут 0 секунд)"
        );
    }

    #[test]
    fn test_corrupt_store_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "[]").unwrap();
        let mut dispatcher = Dispatcher::new(Workflow::new(Registry::new(JsonFileStore::new(&path))));

        let reply = body(dispatcher.handle(&text_update(user(10, "Анна"), "браки", None)));
        assert_eq!(reply["text"], "Не удалось прочитать данные о браках. Попробуйте позже.");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }
}
