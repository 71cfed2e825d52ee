//! Key/value settings rows.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::store::error::{QueryContext, StoreResult};

pub fn get(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM settings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .op("load setting")
}

pub fn all(conn: &Connection) -> StoreResult<BTreeMap<String, String>> {
    let mut stmt = conn
        .prepare("SELECT key, value FROM settings")
        .op("prepare settings list")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .op("list settings")?
        .collect::<Result<BTreeMap<_, _>, _>>()
        .op("list settings")?;
    Ok(rows)
}

pub fn upsert(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .op("upsert setting")?;
    Ok(())
}

pub fn clear(conn: &Connection) -> StoreResult<usize> {
    conn.execute("DELETE FROM settings", []).op("clear settings")
}
