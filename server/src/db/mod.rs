//! Database module for PostgreSQL persistence.

mod audit;
mod items;
mod metadata;
mod mirror;
mod pool;

pub use audit::*;
pub use items::*;
pub use metadata::*;
pub use mirror::*;
pub use pool::*;

/// Longest identifier PostgreSQL stores without truncating it.
const MAX_IDENT_LEN: usize = 63;

/// Errors raised by the PostgreSQL mirror.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid table name {0:?}")]
    InvalidTable(String),

    #[error("invalid stored row: {0}")]
    InvalidRow(String),
}

/// Double-quote `name` for use as a table name in SQL text.
///
/// Returns `None` unless `name` is a plain identifier: an ASCII letter or
/// underscore followed by ASCII letters, digits or underscores.
pub fn quote_ident(name: &str) -> Option<String> {
    let mut chars = name.chars();
    let first = chars.next()?;
    let plain = (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= MAX_IDENT_LEN;
    plain.then(|| format!("\"{name}\""))
}

fn quoted(table: &str) -> Result<String, StoreError> {
    quote_ident(table).ok_or_else(|| StoreError::InvalidTable(table.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_identifiers() {
        assert_eq!(quote_ident("items_core").as_deref(), Some("\"items_core\""));
        assert_eq!(quote_ident("_Audit2").as_deref(), Some("\"_Audit2\""));
    }

    #[test]
    fn rejects_everything_else() {
        for name in ["", "2items", "items core", "items\"; DROP", "public.items", "ítems"] {
            assert!(quote_ident(name).is_none(), "{name:?} accepted");
        }
        assert!(quote_ident(&"a".repeat(64)).is_none());
        assert!(quote_ident(&"a".repeat(63)).is_some());
    }
}
