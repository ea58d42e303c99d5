//! Normalized private-stream events.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Balance, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivateEventKind {
    Order,
    Position,
    Account,
}

impl fmt::Display for PrivateEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Order => "order",
            Self::Position => "position",
            Self::Account => "account",
        })
    }
}

/// Account-scoped push from a venue.
///
/// `raw` is the frame exactly as received so consumers can re-read venue
/// specific fields. `balance` is filled for account events whose payload
/// carries a recognizable settlement-currency balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateEvent {
    pub platform: Platform,
    pub kind: PrivateEventKind,
    /// Canonical symbol; empty for account-wide events.
    pub symbol: String,
    pub raw: String,
    pub received_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Balance>,
}

impl PrivateEvent {
    #[must_use]
    pub fn new(
        platform: Platform,
        kind: PrivateEventKind,
        symbol: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            kind,
            symbol: symbol.into(),
            raw: raw.into(),
            received_at: super::now_ms(),
            balance: None,
        }
    }

    #[must_use]
    pub fn with_balance(mut self, balance: Option<Balance>) -> Self {
        self.balance = balance;
        self
    }
}
