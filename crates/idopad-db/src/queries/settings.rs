//! Settings key/value query functions.

use rusqlite::{Connection, OptionalExtension};

use crate::Result;

/// Read a setting value.
pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?)
}

/// Write a setting value.
pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_seeded() {
        let conn = crate::open_memory().expect("open");
        assert_eq!(
            get(&conn, "price_poll_enabled").expect("get"),
            Some("true".to_string())
        );
    }

    #[test]
    fn test_set_overwrites() {
        let conn = crate::open_memory().expect("open");
        set(&conn, "price_poll_enabled", "false").expect("set");
        assert_eq!(
            get(&conn, "price_poll_enabled").expect("get"),
            Some("false".to_string())
        );
        assert_eq!(get(&conn, "missing").expect("get"), None);
    }
}
