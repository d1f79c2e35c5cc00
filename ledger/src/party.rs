// ledger/src/party.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{LedgerError, LedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyKind {
    Seller,
    Collector,
    Company,
}

impl PartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seller => "SELLER",
            Self::Collector => "COLLECTOR",
            Self::Company => "COMPANY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SELLER" => Some(Self::Seller),
            "COLLECTOR" => Some(Self::Collector),
            "COMPANY" => Some(Self::Company),
            _ => None,
        }
    }
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seller, collector or company, joined with its owning user.
///
/// `id` is the role id (the one referenced by ledger events), `user_id`
/// the account that registered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: PartyKind,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub kind: PartyKind,
    pub display_name: String,
}

impl Registration {
    pub fn new(kind: PartyKind, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        let email = email.into();
        let username = email.split('@').next().unwrap_or_default().to_string();
        Self {
            username,
            email,
            kind,
            display_name: display_name.into(),
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(LedgerError::invalid_input("A valid email is required"));
        }
        if self.display_name.trim().is_empty() {
            return Err(LedgerError::invalid_input("Display name is required"));
        }
        Ok(())
    }
}
