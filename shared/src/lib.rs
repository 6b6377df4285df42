use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod ids;
mod order;

pub use ids::{normalize_id, normalize_optional, RawId};
pub use order::{
    classify, is_completed, CompletedAt, OrderOutcome, OrderSnapshot, UNSET_COMPLETION_DATE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    Pending,
    Converted,
    NoContact,
    Abandoned,
    Error,
}

impl CheckoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStatus::Pending => "pending",
            CheckoutStatus::Converted => "converted",
            CheckoutStatus::NoContact => "no_contact",
            CheckoutStatus::Abandoned => "abandoned",
            CheckoutStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CheckoutStatus::Pending)
    }
}

impl fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown checkout status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for CheckoutStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CheckoutStatus::Pending),
            "converted" => Ok(CheckoutStatus::Converted),
            "no_contact" => Ok(CheckoutStatus::NoContact),
            "abandoned" => Ok(CheckoutStatus::Abandoned),
            "error" => Ok(CheckoutStatus::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl From<OrderOutcome> for CheckoutStatus {
    fn from(outcome: OrderOutcome) -> Self {
        match outcome {
            OrderOutcome::Converted => CheckoutStatus::Converted,
            OrderOutcome::NoContact => CheckoutStatus::NoContact,
            OrderOutcome::Abandoned => CheckoutStatus::Abandoned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkout {
    pub checkout_id: String,
    pub store_id: String,
    pub cart_url: String,
    pub status: CheckoutStatus,
    pub created_at: DateTime<Utc>,
    pub check_after: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewCheckout {
    pub checkout_id: String,
    pub store_id: String,
    pub cart_url: String,
    pub created_at: DateTime<Utc>,
    pub check_after: DateTime<Utc>,
}

impl Checkout {
    pub fn new(new: NewCheckout) -> Self {
        Self {
            checkout_id: new.checkout_id,
            store_id: new.store_id,
            cart_url: new.cart_url,
            status: CheckoutStatus::Pending,
            created_at: new.created_at,
            check_after: new.check_after,
            processed_at: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == CheckoutStatus::Pending && self.check_after <= now
    }
}

#[derive(Debug, Clone)]
pub struct StoreCredential {
    pub store_id: String,
    pub access_token: SecretString,
    pub created_at: DateTime<Utc>,
}

const TOKEN_PREVIEW_CHARS: usize = 10;

/// First characters of a token, safe to show on operator screens.
pub fn token_preview(token: &SecretString) -> String {
    let prefix: String = token.expose_secret().chars().take(TOKEN_PREVIEW_CHARS).collect();
    format!("{prefix}...")
}
