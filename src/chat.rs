use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type UserId = i64;

/// Decimal chat id, used as the key of the persisted object.
pub type ChatKey = String;

pub type ChatRegistry = BTreeMap<ChatKey, Vec<MarriageRecord>>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarriageRecord {
    pub users: [UserId; 2],
    pub start_time: f64,
}

impl MarriageRecord {
    pub fn new(users: [UserId; 2], start_time: f64) -> Self {
        Self { users, start_time }
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.users.contains(&user_id)
    }

    /// The other half of the couple, or `None` if `user_id` is not in it.
    pub fn partner_of(&self, user_id: UserId) -> Option<UserId> {
        match self.users {
            [a, b] if a == user_id => Some(b),
            [a, b] if b == user_id => Some(a),
            _ => None,
        }
    }

    /// Unordered comparison: `{a, b}` matches `{b, a}`.
    pub fn is_pair(&self, a: UserId, b: UserId) -> bool {
        let [x, y] = self.users;
        (x == a && y == b) || (x == b && y == a)
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.start_time
    }
}

pub fn chat_key(chat_id: i64) -> ChatKey {
    chat_id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_unordered() {
        let record = MarriageRecord::new([10, 20], 0.0);
        assert!(record.is_pair(10, 20));
        assert!(record.is_pair(20, 10));
        assert!(!record.is_pair(10, 30));
        assert!(!record.is_pair(10, 10));
    }

    #[test]
    fn test_partner_of() {
        let record = MarriageRecord::new([10, 20], 0.0);
        assert_eq!(record.partner_of(10), Some(20));
        assert_eq!(record.partner_of(20), Some(10));
        assert_eq!(record.partner_of(30), None);
        assert!(record.contains(20));
        assert!(!record.contains(30));
    }

    #[test]
    fn test_persisted_field_names() {
        let record: MarriageRecord =
            serde_json::from_str(r#"{"users": [1, 2], "start_time": 1700000000}"#).unwrap();
        assert_eq!(record.users, [1, 2]);
        assert_eq!(record.start_time, 1700000000.0);
        assert_eq!(chat_key(-100123), "-100123");
    }
}
