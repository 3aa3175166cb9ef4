//! redb table definitions for the Tidings state store.

use redb::TableDefinition;

/// Whole dictionaries keyed by container tag, stored as JSON objects.
pub const DICTIONARIES: TableDefinition<&str, &[u8]> = TableDefinition::new("dictionaries");
