use serde::{Deserialize, Serialize};

/// Placeholder the order API returns for `completed_at` while an order is
/// still open.
pub const UNSET_COMPLETION_DATE: &str = "-0001-11-30 00:00:00.000000";

/// `completed_at` is either a plain string or an object carrying a `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletedAt {
    Text(String),
    Dated {
        #[serde(default)]
        date: Option<String>,
    },
    Other(serde_json::Value),
}

impl CompletedAt {
    pub fn as_date_str(&self) -> Option<&str> {
        match self {
            CompletedAt::Text(text) => Some(text),
            CompletedAt::Dated { date } => date.as_deref(),
            CompletedAt::Other(_) => None,
        }
    }
}

/// The subset of an order the classifier reads, plus the complete document so
/// it can be forwarded to the notification workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    pub completed_at: Option<CompletedAt>,
    pub contact_phone: Option<serde_json::Value>,
    /// Legacy `raw` section; only read when it is an object.
    pub raw: Option<serde_json::Value>,
    pub document: serde_json::Value,
}

#[derive(Deserialize)]
struct SnapshotFields {
    #[serde(default)]
    completed_at: Option<CompletedAt>,
    #[serde(default)]
    contact_phone: Option<serde_json::Value>,
    #[serde(default)]
    raw: Option<serde_json::Value>,
}

impl OrderSnapshot {
    pub fn from_document(document: serde_json::Value) -> Result<Self, serde_json::Error> {
        let fields = SnapshotFields::deserialize(&document)?;
        Ok(Self {
            completed_at: fields.completed_at,
            contact_phone: fields.contact_phone,
            raw: fields.raw,
            document,
        })
    }

    pub fn completion_date(&self) -> Option<&str> {
        self.completed_at.as_ref().and_then(CompletedAt::as_date_str)
    }

    /// Top-level phone, falling back to `raw.contact_phone` only when the
    /// top-level field is absent or null.
    pub fn contact_phone(&self) -> Option<String> {
        let value = match &self.contact_phone {
            Some(value) if !value.is_null() => Some(value),
            _ => self
                .raw
                .as_ref()
                .and_then(serde_json::Value::as_object)
                .and_then(|raw| raw.get("contact_phone")),
        }?;

        let phone = match value {
            serde_json::Value::String(text) => text.trim().to_string(),
            serde_json::Value::Number(number) => number.to_string(),
            _ => return None,
        };
        (!phone.is_empty()).then_some(phone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOutcome {
    Converted,
    NoContact,
    Abandoned,
}

/// Any non-empty value other than the placeholder counts, whitespace included.
pub fn is_completed(completed_at: Option<&str>) -> bool {
    match completed_at {
        Some(date) => !date.is_empty() && date.trim() != UNSET_COMPLETION_DATE,
        None => false,
    }
}

/// Conversion wins over a missing phone: a paid order must never be chased.
pub fn classify(order: &OrderSnapshot) -> OrderOutcome {
    if is_completed(order.completion_date()) {
        return OrderOutcome::Converted;
    }
    match order.contact_phone() {
        Some(_) => OrderOutcome::Abandoned,
        None => OrderOutcome::NoContact,
    }
}
