//! Inbound rows.

use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{ExtensionBag, Inbound};
use crate::store::error::{QueryContext, StoreResult};
use crate::store::{decode, encode};

const TABLE: &str = "inbounds";
const COLUMNS: &str = "id, type, tag, tls_id, options, out_json";

type Raw = (i64, String, String, Option<i64>, String, String);

fn raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<Raw> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn build((id, kind, tag, tls_id, options, out_json): Raw) -> StoreResult<Inbound> {
    Ok(Inbound {
        id,
        kind,
        tag,
        tls_id,
        out_json: decode(TABLE, "out_json", id, &out_json)?,
        options: decode(TABLE, "options", id, &options)?,
    })
}

fn one(conn: &Connection, filter: &str, arg: &dyn rusqlite::ToSql) -> StoreResult<Option<Inbound>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} WHERE {filter}");
    conn.query_row(&sql, [arg], raw)
        .optional()
        .op("load inbound")?
        .map(build)
        .transpose()
}

fn many(conn: &Connection, filter: &str, args: &[&dyn rusqlite::ToSql]) -> StoreResult<Vec<Inbound>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} {filter} ORDER BY id");
    let mut stmt = conn.prepare(&sql).op("prepare inbound list")?;
    let rows = stmt
        .query_map(args, raw)
        .op("list inbounds")?
        .collect::<Result<Vec<_>, _>>()
        .op("list inbounds")?;
    rows.into_iter().map(build).collect()
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Option<Inbound>> {
    one(conn, "id = ?1", &id)
}

pub fn get_by_tag(conn: &Connection, tag: &str) -> StoreResult<Option<Inbound>> {
    one(conn, "tag = ?1", &tag)
}

pub fn list(conn: &Connection) -> StoreResult<Vec<Inbound>> {
    many(conn, "", &[])
}

/// Inbounds that use the given TLS profile.
pub fn list_by_tls(conn: &Connection, tls_id: i64) -> StoreResult<Vec<Inbound>> {
    many(conn, "WHERE tls_id = ?1", &[&tls_id])
}

/// Loads `ids` in the given order, skipping ids with no row.
pub fn get_many(conn: &Connection, ids: &[i64]) -> StoreResult<Vec<Inbound>> {
    let mut found = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(inbound) = get(conn, *id)? {
            found.push(inbound);
        }
    }
    Ok(found)
}

pub fn exists(conn: &Connection, id: i64) -> StoreResult<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM inbounds WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )
    .op("check inbound")
}

pub fn insert(conn: &Connection, inbound: &Inbound) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO inbounds (type, tag, tls_id, options, out_json) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            inbound.kind,
            inbound.tag,
            inbound.tls_id,
            encode(&inbound.options)?,
            encode(&inbound.out_json)?
        ],
    )
    .op("insert inbound")?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, inbound: &Inbound) -> StoreResult<()> {
    conn.execute(
        "UPDATE inbounds SET type = ?1, tag = ?2, tls_id = ?3, options = ?4, out_json = ?5
         WHERE id = ?6",
        params![
            inbound.kind,
            inbound.tag,
            inbound.tls_id,
            encode(&inbound.options)?,
            encode(&inbound.out_json)?,
            inbound.id
        ],
    )
    .op("update inbound")?;
    Ok(())
}

pub fn set_out_json(conn: &Connection, id: i64, out_json: &ExtensionBag) -> StoreResult<()> {
    conn.execute(
        "UPDATE inbounds SET out_json = ?1 WHERE id = ?2",
        params![encode(out_json)?, id],
    )
    .op("update inbound out_json")?;
    Ok(())
}
