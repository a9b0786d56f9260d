use crate::chat::{MarriageRecord, UserId};
use crate::registry::{Registry, Removal};
use crate::store::{Store, StoreError};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

const PAYLOAD_DELIMITER: char = '|';

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("cannot marry yourself")]
    SelfMarriage,
    #[error("one of the users is already married in this chat")]
    AlreadyMarried,
    #[error("user {actor} cannot answer a proposal addressed to {target}")]
    UnauthorizedAction { actor: UserId, target: UserId },
    #[error("user is not married in this chat")]
    NotMarried,
    #[error("no marriages in this chat")]
    ChatNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
    #[error("expected action|proposer|target, got {0:?}")]
    Shape(String),
    #[error("unknown action {0:?}")]
    Action(String),
    #[error("invalid user id {0:?}")]
    UserId(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Accept,
    Decline,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::Decline => "decline",
        }
    }
}

/// A pending proposal as carried by an inline button: `accept|10|20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordance {
    pub action: Action,
    pub proposer: UserId,
    pub target: UserId,
}

impl fmt::Display for Affordance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}",
            self.action.as_str(),
            self.proposer,
            self.target,
            d = PAYLOAD_DELIMITER
        )
    }
}

impl FromStr for Affordance {
    type Err = PayloadError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = payload.split(PAYLOAD_DELIMITER).collect();
        let (action, proposer, target) = match parts.as_slice() {
            [action, proposer, target] => (*action, *proposer, *target),
            _ => return Err(PayloadError::Shape(payload.to_string())),
        };
        let action = match action {
            "accept" => Action::Accept,
            "decline" => Action::Decline,
            other => return Err(PayloadError::Action(other.to_string())),
        };
        let parse_id = |raw: &str| {
            raw.parse::<UserId>()
                .map_err(|_| PayloadError::UserId(raw.to_string()))
        };
        Ok(Affordance {
            action,
            proposer: parse_id(proposer)?,
            target: parse_id(target)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub proposer: UserId,
    pub target: UserId,
}

impl Proposal {
    pub fn affordance(&self, action: Action) -> Affordance {
        Affordance {
            action,
            proposer: self.proposer,
            target: self.target,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Married(MarriageRecord),
    Declined { proposer: UserId, target: UserId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divorce {
    pub caller: UserId,
    pub partner: UserId,
    pub removal: Removal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListedMarriage {
    pub users: [UserId; 2],
    pub elapsed: f64,
}

/// Propose, answer, divorce and list, with the one-marriage-per-user rule
/// checked here before anything reaches the registry.
pub struct Workflow<S> {
    registry: Registry<S>,
}

impl<S: Store> Workflow<S> {
    pub fn new(registry: Registry<S>) -> Self {
        Workflow { registry }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    pub fn propose(&self, chat: &str, proposer: UserId, target: UserId) -> Result<Proposal, WorkflowError> {
        if proposer == target {
            return Err(WorkflowError::SelfMarriage);
        }
        if self.registry.find_marriage_for_user(chat, proposer)?.is_some()
            || self.registry.find_marriage_for_user(chat, target)?.is_some()
        {
            return Err(WorkflowError::AlreadyMarried);
        }
        Ok(Proposal { proposer, target })
    }

    /// Only the addressee may answer. Accepting twice marries twice; nothing
    /// here remembers which proposals were already answered.
    ///
    /// Marital status is checked at `propose` only. If 10 proposes to 20 and
    /// to 30 and both accept, 10 ends up in two records; `divorce` then
    /// dissolves the first one and `list` shows both.
    pub fn respond(
        &self,
        chat: &str,
        actor: UserId,
        affordance: Affordance,
    ) -> Result<Resolution, WorkflowError> {
        if actor != affordance.target {
            return Err(WorkflowError::UnauthorizedAction {
                actor,
                target: affordance.target,
            });
        }
        match affordance.action {
            Action::Accept => {
                let record =
                    self.registry
                        .add_marriage(chat, affordance.proposer, affordance.target)?;
                info!(chat, users = ?record.users, "marriage registered");
                Ok(Resolution::Married(record))
            }
            Action::Decline => Ok(Resolution::Declined {
                proposer: affordance.proposer,
                target: affordance.target,
            }),
        }
    }

    pub fn divorce(&self, chat: &str, caller: UserId) -> Result<Divorce, WorkflowError> {
        let marriage = self
            .registry
            .find_marriage_for_user(chat, caller)?
            .ok_or(WorkflowError::NotMarried)?;
        let partner = marriage.partner_of(caller).ok_or(WorkflowError::NotMarried)?;
        let removal = self.registry.remove_marriage(chat, caller, partner)?;
        info!(chat, caller, partner, ?removal, "marriage dissolved");
        Ok(Divorce {
            caller,
            partner,
            removal,
        })
    }

    /// Oldest marriage first.
    pub fn list(&self, chat: &str) -> Result<Vec<ListedMarriage>, WorkflowError> {
        let marriages = self.registry.marriages(chat)?;
        if marriages.is_empty() {
            return Err(WorkflowError::ChatNotFound);
        }
        let now = self.registry.now();
        let mut listed: Vec<ListedMarriage> = marriages
            .into_iter()
            .map(|m| ListedMarriage {
                users: m.users,
                elapsed: m.elapsed(now),
            })
            .collect();
        listed.sort_by(|a, b| b.elapsed.total_cmp(&a.elapsed));
        Ok(listed)
    }
}
