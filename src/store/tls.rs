//! TLS profile rows.

use rusqlite::{params, Connection, OptionalExtension};

use crate::model::TlsProfile;
use crate::store::error::{QueryContext, StoreResult};
use crate::store::{decode, encode};

const TABLE: &str = "tls";
const COLUMNS: &str = "id, name, server, client";

type Raw = (i64, String, String, String);

fn raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<Raw> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn build((id, name, server, client): Raw) -> StoreResult<TlsProfile> {
    Ok(TlsProfile {
        id,
        name,
        server: decode(TABLE, "server", id, &server)?,
        client: decode(TABLE, "client", id, &client)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Option<TlsProfile>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} WHERE id = ?1");
    conn.query_row(&sql, params![id], raw)
        .optional()
        .op("load tls profile")?
        .map(build)
        .transpose()
}

pub fn list(conn: &Connection) -> StoreResult<Vec<TlsProfile>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} ORDER BY id");
    let mut stmt = conn.prepare(&sql).op("prepare tls list")?;
    let rows = stmt
        .query_map([], raw)
        .op("list tls profiles")?
        .collect::<Result<Vec<_>, _>>()
        .op("list tls profiles")?;
    rows.into_iter().map(build).collect()
}

pub fn insert(conn: &Connection, profile: &TlsProfile) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO tls (name, server, client) VALUES (?1, ?2, ?3)",
        params![
            profile.name,
            encode(&profile.server)?,
            encode(&profile.client)?
        ],
    )
    .op("insert tls profile")?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, profile: &TlsProfile) -> StoreResult<()> {
    conn.execute(
        "UPDATE tls SET name = ?1, server = ?2, client = ?3 WHERE id = ?4",
        params![
            profile.name,
            encode(&profile.server)?,
            encode(&profile.client)?,
            profile.id
        ],
    )
    .op("update tls profile")?;
    Ok(())
}
