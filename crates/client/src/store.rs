//! Record store contract.
//!
//! A [`RecordStore`] is a generic tabular store with row-level filtering.
//! Rows travel as JSON objects; services decode them into typed records with
//! [`decode_row`].

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// A single row as returned by the store.
pub type Row = Map<String, Value>;

/// Sort direction for [`Select::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// The keyword used by PostgREST-style `order` parameters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// Equality filter `column = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    /// Returns `true` if `row` satisfies this filter.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column) == Some(&self.value)
    }
}

/// Ordering clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// A select query: `table`, ANDed equality filters, optional ordering.
///
/// ```
/// use porchlight_client::store::{Direction, Select};
///
/// let query = Select::from("addresses")
///     .eq("user_id", "u1")
///     .order("created_at", Direction::Descending);
/// assert_eq!(query.table(), "addresses");
/// assert_eq!(query.filters().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    table: String,
    filters: Vec<Filter>,
    order: Option<Order>,
}

impl Select {
    /// Start a query against `table`.
    #[must_use]
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: None,
        }
    }

    /// Add an equality filter.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Set the ordering, replacing any previous one.
    #[must_use]
    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    #[must_use]
    pub const fn ordering(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Returns `true` if `row` satisfies every filter.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

/// Remote tabular persistence.
pub trait RecordStore: Send + Sync {
    /// All rows matching `query`, in the requested order.
    fn select(&self, query: &Select) -> impl Future<Output = Result<Vec<Row>, StoreError>> + Send;

    /// Zero or one row matching `query`.
    ///
    /// Finding no row is not an error; finding several is
    /// [`StoreError::MultipleRows`].
    fn select_one(
        &self,
        query: &Select,
    ) -> impl Future<Output = Result<Option<Row>, StoreError>> + Send;

    /// Insert `rows` into `table`. Store-assigned columns (`id`,
    /// `created_at`) are filled in by the store.
    fn insert(
        &self,
        table: &str,
        rows: Vec<Row>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<T: RecordStore> RecordStore for Arc<T> {
    fn select(&self, query: &Select) -> impl Future<Output = Result<Vec<Row>, StoreError>> + Send {
        (**self).select(query)
    }

    fn select_one(
        &self,
        query: &Select,
    ) -> impl Future<Output = Result<Option<Row>, StoreError>> + Send {
        (**self).select_one(query)
    }

    fn insert(
        &self,
        table: &str,
        rows: Vec<Row>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).insert(table, rows)
    }
}

/// Decode a store row into a typed record.
///
/// # Errors
///
/// Returns `StoreError::Decode` if the row does not match `T`.
pub fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Collapse a result set into a maybe-one answer.
///
/// # Errors
///
/// Returns `StoreError::MultipleRows` if more than one row is present.
pub fn at_most_one(table: &str, mut rows: Vec<Row>) -> Result<Option<Row>, StoreError> {
    match rows.len() {
        0 | 1 => Ok(rows.pop()),
        count => Err(StoreError::MultipleRows {
            table: table.to_owned(),
            count,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn test_select_matches_all_filters() {
        let query = Select::from("admin_users").eq("user_id", "u2").eq("active", true);
        assert!(query.matches(&row(json!({"user_id": "u2", "active": true}))));
        assert!(!query.matches(&row(json!({"user_id": "u2", "active": false}))));
        assert!(!query.matches(&row(json!({"user_id": "u3", "active": true}))));
        assert!(!query.matches(&row(json!({"active": true}))));
    }

    #[test]
    fn test_order_replaces_previous() {
        let query = Select::from("addresses")
            .order("city", Direction::Ascending)
            .order("created_at", Direction::Descending);
        let order = query.ordering().unwrap();
        assert_eq!(order.column, "created_at");
        assert_eq!(order.direction.as_str(), "desc");
    }

    #[test]
    fn test_at_most_one() {
        assert!(at_most_one("t", vec![]).unwrap().is_none());
        assert!(at_most_one("t", vec![Row::new()]).unwrap().is_some());
        let err = at_most_one("t", vec![Row::new(), Row::new()]).unwrap_err();
        assert!(matches!(err, StoreError::MultipleRows { count: 2, .. }));
    }

    #[test]
    fn test_decode_row_reports_mismatch() {
        #[derive(Debug, serde::Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }
        assert!(decode_row::<Named>(row(json!({"name": "x"}))).is_ok());
        assert!(matches!(
            decode_row::<Named>(row(json!({"name": 1}))),
            Err(StoreError::Decode(_))
        ));
    }
}
