//! Cursor-based pagination primitives, grounded on the repository base
//! class's `encode_cursor` / `decode_cursor` / `list` trio.
//!
//! A cursor is the base64 encoding of a small JSON envelope carrying the
//! sort field's value and the row id at the pagination boundary, so a page
//! boundary survives concurrent inserts/deletes without drifting (unlike
//! offset pagination).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::TrustError;

/// The decoded contents of an opaque pagination cursor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CursorPosition {
    /// Name of the column the result set is ordered by.
    pub field: String,
    /// Value of `field` on the last row of the previous page.
    pub value: Value,
    /// Id of the last row of the previous page, breaking ties when `value`
    /// repeats.
    pub id: Uuid,
}

impl CursorPosition {
    pub fn encode(&self) -> Result<String, TrustError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| TrustError::BadRequest(format!("cursor encoding failed: {e}")))?;
        Ok(BASE64.encode(json))
    }

    pub fn decode(cursor: &str) -> Result<Self, TrustError> {
        let bytes = BASE64
            .decode(cursor)
            .map_err(|e| TrustError::BadRequest(format!("invalid cursor: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| TrustError::BadRequest(format!("invalid cursor payload: {e}")))
    }
}

/// A request for one page of a list operation.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub cursor: Option<CursorPosition>,
    pub limit: usize,
    /// Column results are ordered by; must match the cursor's `field` when a
    /// cursor is supplied.
    pub order_by: String,
}

impl PageRequest {
    pub fn first_page(order_by: impl Into<String>, limit: usize) -> Self {
        Self {
            cursor: None,
            limit,
            order_by: order_by.into(),
        }
    }

    pub fn after(cursor: CursorPosition, order_by: impl Into<String>, limit: usize) -> Result<Self, TrustError> {
        let order_by = order_by.into();
        if cursor.field != order_by {
            return Err(TrustError::BadRequest(format!(
                "cursor was issued for field '{}' but page requests field '{}'",
                cursor.field, order_by
            )));
        }
        Ok(Self {
            cursor: Some(cursor),
            limit,
            order_by,
        })
    }

    /// Over-fetch by one row so the store can determine whether another
    /// page follows without a second round trip.
    pub fn fetch_limit(&self) -> usize {
        self.limit.saturating_add(1)
    }
}

/// One page of results, with the cursor to request the next page if any.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Build a page from an over-fetched result set (`fetch_limit` rows
    /// requested), trimming the lookahead row and deriving the next cursor
    /// from it.
    pub fn from_overfetched(
        mut rows: Vec<T>,
        limit: usize,
        order_by: &str,
        position_of: impl Fn(&T) -> (Value, Uuid),
    ) -> Result<Self, TrustError> {
        let has_more = rows.len() > limit;
        if has_more {
            rows.truncate(limit);
        }
        let next_cursor = if has_more {
            let (value, id) = rows
                .last()
                .map(position_of)
                .ok_or_else(|| TrustError::Internal(anyhow::anyhow!("overfetch flagged more rows but page is empty")))?;
            Some(
                CursorPosition {
                    field: order_by.to_string(),
                    value,
                    id,
                }
                .encode()?,
            )
        } else {
            None
        };
        Ok(Page {
            items: rows,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips_through_base64_json() {
        let pos = CursorPosition {
            field: "created_at".into(),
            value: Value::String("2026-01-01T00:00:00Z".into()),
            id: Uuid::new_v4(),
        };
        let encoded = pos.encode().unwrap();
        let decoded = CursorPosition::decode(&encoded).unwrap();
        assert_eq!(pos, decoded);
    }

    #[test]
    fn malformed_cursor_is_a_bad_request() {
        let err = CursorPosition::decode("not-valid-base64!!!").unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn page_request_rejects_cursor_field_mismatch() {
        let cursor = CursorPosition {
            field: "created_at".into(),
            value: Value::Null,
            id: Uuid::new_v4(),
        };
        let err = PageRequest::after(cursor, "updated_at", 20).unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn overfetch_by_one_reveals_next_page() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let rows: Vec<(Uuid, i64)> = ids.iter().enumerate().map(|(i, id)| (*id, i as i64)).collect();
        let page = Page::from_overfetched(rows.clone(), 3, "seq", |(id, seq)| {
            (Value::from(*seq), *id)
        })
        .unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.next_cursor.is_some());
    }

    #[test]
    fn exact_fit_has_no_next_cursor() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let rows: Vec<(Uuid, i64)> = ids.iter().enumerate().map(|(i, id)| (*id, i as i64)).collect();
        let page = Page::from_overfetched(rows, 3, "seq", |(id, seq)| (Value::from(*seq), *id)).unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.next_cursor.is_none());
    }
}
