use crate::chat::{MarriageRecord, UserId};
use crate::store::{Store, StoreError};
use std::time::{SystemTime, UNIX_EPOCH};

pub type Clock = Box<dyn Fn() -> f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotFound,
}

/// Plain CRUD over the persisted marriages of every chat.
///
/// Each call loads the registry from the store and, if it changed anything,
/// writes it back in full. Nothing here stops a user from appearing in two
/// records of the same chat; callers check that before `add_marriage`.
pub struct Registry<S> {
    store: S,
    clock: Clock,
}

impl<S: Store> Registry<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Box::new(unix_now))
    }

    pub fn with_clock(store: S, clock: Clock) -> Self {
        Registry { store, clock }
    }

    pub fn now(&self) -> f64 {
        (self.clock)()
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn add_marriage(&self, chat: &str, a: UserId, b: UserId) -> Result<MarriageRecord, StoreError> {
        let mut registry = self.store.load()?;
        let record = MarriageRecord::new([a, b], self.now());
        registry
            .entry(chat.to_string())
            .or_insert_with(Vec::new)
            .push(record.clone());
        self.store.save(&registry)?;
        Ok(record)
    }

    pub fn remove_marriage(&self, chat: &str, a: UserId, b: UserId) -> Result<Removal, StoreError> {
        let mut registry = self.store.load()?;
        let marriages = match registry.get_mut(chat) {
            Some(marriages) => marriages,
            None => return Ok(Removal::NotFound),
        };

        let before = marriages.len();
        marriages.retain(|marriage| !marriage.is_pair(a, b));
        let removed = before - marriages.len();
        self.store.save(&registry)?;

        Ok(if removed > 0 {
            Removal::Removed
        } else {
            Removal::NotFound
        })
    }

    /// First record in chat order that contains `user_id`.
    pub fn find_marriage_for_user(
        &self,
        chat: &str,
        user_id: UserId,
    ) -> Result<Option<MarriageRecord>, StoreError> {
        let mut registry = self.store.load()?;
        Ok(registry
            .remove(chat)
            .and_then(|marriages| marriages.into_iter().find(|m| m.contains(user_id))))
    }

    pub fn marriages(&self, chat: &str) -> Result<Vec<MarriageRecord>, StoreError> {
        Ok(self.store.load()?.remove(chat).unwrap_or_default())
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry_at(now: f64) -> Registry<MemoryStore> {
        Registry::with_clock(MemoryStore::new(), Box::new(move || now))
    }

    #[test]
    fn test_add_then_find_both_partners() {
        let registry = registry_at(100.0);
        registry.add_marriage("1", 10, 20).unwrap();

        for user in [10, 20] {
            let found = registry.find_marriage_for_user("1", user).unwrap().unwrap();
            assert!(found.is_pair(10, 20));
            assert_eq!(found.start_time, 100.0);
        }
        assert!(registry.find_marriage_for_user("1", 30).unwrap().is_none());
        assert!(registry.find_marriage_for_user("2", 10).unwrap().is_none());
    }

    #[test]
    fn test_chats_are_isolated() {
        let registry = registry_at(0.0);
        registry.add_marriage("1", 10, 20).unwrap();
        registry.add_marriage("2", 10, 30).unwrap();

        let in_first = registry.find_marriage_for_user("1", 10).unwrap().unwrap();
        let in_second = registry.find_marriage_for_user("2", 10).unwrap().unwrap();
        assert_eq!(in_first.partner_of(10), Some(20));
        assert_eq!(in_second.partner_of(10), Some(30));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = registry_at(0.0);
        assert_eq!(registry.remove_marriage("1", 10, 20).unwrap(), Removal::NotFound);
        assert_eq!(registry.store().saves(), 0);

        registry.add_marriage("1", 10, 20).unwrap();
        assert_eq!(registry.remove_marriage("1", 20, 10).unwrap(), Removal::Removed);
        assert_eq!(registry.remove_marriage("1", 20, 10).unwrap(), Removal::NotFound);
        assert!(registry.find_marriage_for_user("1", 10).unwrap().is_none());
    }

    #[test]
    fn test_remove_matches_exact_pair_only() {
        let registry = registry_at(0.0);
        registry.add_marriage("1", 10, 20).unwrap();
        registry.add_marriage("1", 30, 40).unwrap();

        assert_eq!(registry.remove_marriage("1", 10, 30).unwrap(), Removal::NotFound);
        assert_eq!(registry.marriages("1").unwrap().len(), 2);

        assert_eq!(registry.remove_marriage("1", 40, 30).unwrap(), Removal::Removed);
        let left = registry.marriages("1").unwrap();
        assert_eq!(left.len(), 1);
        assert!(left[0].is_pair(10, 20));
    }

    #[test]
    fn test_duplicates_first_match_wins_and_remove_drops_all() {
        let registry = registry_at(0.0);
        // The registry does not guard against this; the workflow does.
        registry.add_marriage("1", 10, 20).unwrap();
        registry.add_marriage("1", 10, 30).unwrap();
        registry.add_marriage("1", 20, 10).unwrap();

        let found = registry.find_marriage_for_user("1", 10).unwrap().unwrap();
        assert_eq!(found.partner_of(10), Some(20));

        assert_eq!(registry.remove_marriage("1", 10, 20).unwrap(), Removal::Removed);
        let left = registry.marriages("1").unwrap();
        assert_eq!(left.len(), 1);
        assert!(left[0].is_pair(10, 30));
    }
}
