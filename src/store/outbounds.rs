//! Outbound rows.

use rusqlite::{params, Connection, OptionalExtension};

use crate::model::Outbound;
use crate::store::error::{QueryContext, StoreResult};
use crate::store::{decode, encode};

const TABLE: &str = "outbounds";
const COLUMNS: &str = "id, type, tag, options";

type Raw = (i64, String, String, String);

fn raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<Raw> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn build((id, kind, tag, options): Raw) -> StoreResult<Outbound> {
    Ok(Outbound {
        id,
        kind,
        tag,
        options: decode(TABLE, "options", id, &options)?,
    })
}

pub fn get_by_tag(conn: &Connection, tag: &str) -> StoreResult<Option<Outbound>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} WHERE tag = ?1");
    conn.query_row(&sql, params![tag], raw)
        .optional()
        .op("load outbound")?
        .map(build)
        .transpose()
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Option<Outbound>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} WHERE id = ?1");
    conn.query_row(&sql, params![id], raw)
        .optional()
        .op("load outbound")?
        .map(build)
        .transpose()
}

pub fn list(conn: &Connection) -> StoreResult<Vec<Outbound>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} ORDER BY id");
    let mut stmt = conn.prepare(&sql).op("prepare outbound list")?;
    let rows = stmt
        .query_map([], raw)
        .op("list outbounds")?
        .collect::<Result<Vec<_>, _>>()
        .op("list outbounds")?;
    rows.into_iter().map(build).collect()
}

pub fn insert(conn: &Connection, outbound: &Outbound) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO outbounds (type, tag, options) VALUES (?1, ?2, ?3)",
        params![outbound.kind, outbound.tag, encode(&outbound.options)?],
    )
    .op("insert outbound")?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, outbound: &Outbound) -> StoreResult<()> {
    conn.execute(
        "UPDATE outbounds SET type = ?1, tag = ?2, options = ?3 WHERE id = ?4",
        params![
            outbound.kind,
            outbound.tag,
            encode(&outbound.options)?,
            outbound.id
        ],
    )
    .op("update outbound")?;
    Ok(())
}
