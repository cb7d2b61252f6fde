//! Postal address records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::{AddressId, UserId};

/// A persisted postal address belonging to exactly one user.
///
/// Every field except `id`, `user_id` and `created_at` is caller-supplied and
/// opaque: no format validation happens on this side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Store-assigned identifier.
    pub id: AddressId,
    /// Owner of the record, taken from the session at write time.
    pub user_id: UserId,
    pub house_number: String,
    pub street: String,
    pub area: String,
    pub city: String,
    pub state: String,
    pub pin_code: String,
    pub mobile: String,
    /// Store-assigned creation time; addresses are listed newest first.
    pub created_at: DateTime<Utc>,
}

/// The caller-supplied part of an address.
///
/// There is no `user_id` field: ownership comes from the session.
/// Deserializing input that carries a `user_id` key silently drops it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    pub house_number: String,
    pub street: String,
    pub area: String,
    pub city: String,
    pub state: String,
    pub pin_code: String,
    pub mobile: String,
}

impl NewAddress {
    /// Build the row to persist, owned by `owner`.
    ///
    /// The owner column is written last so nothing in the payload can
    /// override it.
    #[must_use]
    pub fn into_row(self, owner: &UserId) -> Map<String, Value> {
        let mut row = Map::with_capacity(8);
        row.insert("house_number".into(), Value::String(self.house_number));
        row.insert("street".into(), Value::String(self.street));
        row.insert("area".into(), Value::String(self.area));
        row.insert("city".into(), Value::String(self.city));
        row.insert("state".into(), Value::String(self.state));
        row.insert("pin_code".into(), Value::String(self.pin_code));
        row.insert("mobile".into(), Value::String(self.mobile));
        row.insert("user_id".into(), Value::String(owner.as_str().to_owned()));
        row
    }
}

impl Address {
    /// Single-line rendering, e.g. for CLI output.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!(
            "{} {}, {}, {}, {} {} (tel. {})",
            self.house_number,
            self.street,
            self.area,
            self.city,
            self.state,
            self.pin_code,
            self.mobile
        )
    }
}
