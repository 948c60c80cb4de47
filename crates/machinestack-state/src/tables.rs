//! redb table definitions for the machine state store.

use redb::TableDefinition;

/// Machine records keyed by `machine:{name}`.
pub const MACHINES: TableDefinition<&str, &[u8]> = TableDefinition::new("machines");

/// Key prefix shared by every machine record.
pub const MACHINE_KEY_PREFIX: &str = "machine:";

/// Build the table key for a machine name.
pub fn machine_key(name: &str) -> String {
    format!("{MACHINE_KEY_PREFIX}{name}")
}
