//! Endpoint rows. `ext` lives in its own column so it never mixes with the
//! options sent to the core.

use rusqlite::{params, Connection, OptionalExtension};

use crate::model::Endpoint;
use crate::store::error::{QueryContext, StoreResult};
use crate::store::{decode, encode};

const TABLE: &str = "endpoints";
const COLUMNS: &str = "id, type, tag, options, ext";

type Raw = (i64, String, String, String, String);

fn raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<Raw> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn build((id, kind, tag, options, ext): Raw) -> StoreResult<Endpoint> {
    Ok(Endpoint {
        id,
        kind,
        tag,
        ext: decode(TABLE, "ext", id, &ext)?,
        options: decode(TABLE, "options", id, &options)?,
    })
}

fn collect(conn: &Connection, sql: &str, arg: Option<&str>) -> StoreResult<Vec<Endpoint>> {
    let mut stmt = conn.prepare(sql).op("prepare endpoint list")?;
    let rows = match arg {
        Some(arg) => stmt.query_map(params![arg], raw),
        None => stmt.query_map([], raw),
    }
    .op("list endpoints")?
    .collect::<Result<Vec<_>, _>>()
    .op("list endpoints")?;
    rows.into_iter().map(build).collect()
}

pub fn get_by_tag(conn: &Connection, tag: &str) -> StoreResult<Option<Endpoint>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} WHERE tag = ?1");
    conn.query_row(&sql, params![tag], raw)
        .optional()
        .op("load endpoint")?
        .map(build)
        .transpose()
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Option<Endpoint>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} WHERE id = ?1");
    conn.query_row(&sql, params![id], raw)
        .optional()
        .op("load endpoint")?
        .map(build)
        .transpose()
}

pub fn list(conn: &Connection) -> StoreResult<Vec<Endpoint>> {
    collect(conn, &format!("SELECT {COLUMNS} FROM {TABLE} ORDER BY id"), None)
}

pub fn list_by_type(conn: &Connection, kind: &str) -> StoreResult<Vec<Endpoint>> {
    collect(
        conn,
        &format!("SELECT {COLUMNS} FROM {TABLE} WHERE type = ?1 ORDER BY id"),
        Some(kind),
    )
}

pub fn insert(conn: &Connection, endpoint: &Endpoint) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO endpoints (type, tag, options, ext) VALUES (?1, ?2, ?3, ?4)",
        params![
            endpoint.kind,
            endpoint.tag,
            encode(&endpoint.options)?,
            encode(&endpoint.ext)?
        ],
    )
    .op("insert endpoint")?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, endpoint: &Endpoint) -> StoreResult<()> {
    conn.execute(
        "UPDATE endpoints SET type = ?1, tag = ?2, options = ?3, ext = ?4 WHERE id = ?5",
        params![
            endpoint.kind,
            endpoint.tag,
            encode(&endpoint.options)?,
            encode(&endpoint.ext)?,
            endpoint.id
        ],
    )
    .op("update endpoint")?;
    Ok(())
}
