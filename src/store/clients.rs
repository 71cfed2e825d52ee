//! Client rows.
//!
//! The linked inbound ids are a JSON array column; membership is tested with
//! the JSON1 `json_each` table function.

use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{Client, Descriptor, ExtensionBag};
use crate::store::error::{QueryContext, StoreResult};
use crate::store::{decode, encode};

const TABLE: &str = "clients";
const COLUMNS: &str =
    "id, enable, name, desc, \"group\", inbounds, links, config, up, down, volume, expiry";
const LINKED: &str =
    "EXISTS (SELECT 1 FROM json_each(clients.inbounds) WHERE json_each.value = ?1)";

struct Raw {
    id: i64,
    enable: bool,
    name: String,
    desc: String,
    group: String,
    inbounds: String,
    links: String,
    config: String,
    up: i64,
    down: i64,
    volume: i64,
    expiry: i64,
}

fn raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<Raw> {
    Ok(Raw {
        id: row.get(0)?,
        enable: row.get(1)?,
        name: row.get(2)?,
        desc: row.get(3)?,
        group: row.get(4)?,
        inbounds: row.get(5)?,
        links: row.get(6)?,
        config: row.get(7)?,
        up: row.get(8)?,
        down: row.get(9)?,
        volume: row.get(10)?,
        expiry: row.get(11)?,
    })
}

fn build(r: Raw) -> StoreResult<Client> {
    Ok(Client {
        id: r.id,
        enable: r.enable,
        name: r.name,
        desc: r.desc,
        group: r.group,
        inbounds: decode(TABLE, "inbounds", r.id, &r.inbounds)?,
        links: decode(TABLE, "links", r.id, &r.links)?,
        config: decode(TABLE, "config", r.id, &r.config)?,
        up: r.up,
        down: r.down,
        volume: r.volume,
        expiry: r.expiry,
    })
}

fn many(
    conn: &Connection,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
) -> StoreResult<Vec<Client>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} {filter} ORDER BY id");
    let mut stmt = conn.prepare(&sql).op("prepare client list")?;
    let rows = stmt
        .query_map(args, raw)
        .op("list clients")?
        .collect::<Result<Vec<_>, _>>()
        .op("list clients")?;
    rows.into_iter().map(build).collect()
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Option<Client>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} WHERE id = ?1");
    conn.query_row(&sql, params![id], raw)
        .optional()
        .op("load client")?
        .map(build)
        .transpose()
}

pub fn get_by_name(conn: &Connection, name: &str) -> StoreResult<Option<Client>> {
    let sql = format!("SELECT {COLUMNS} FROM {TABLE} WHERE name = ?1");
    conn.query_row(&sql, params![name], raw)
        .optional()
        .op("load client")?
        .map(build)
        .transpose()
}

pub fn list(conn: &Connection) -> StoreResult<Vec<Client>> {
    many(conn, "", &[])
}

/// Clients whose link set contains `inbound_id`.
pub fn list_linked(conn: &Connection, inbound_id: i64) -> StoreResult<Vec<Client>> {
    many(conn, &format!("WHERE {LINKED}"), &[&inbound_id])
}

/// Enabled clients over quota or past expiry at `now` (unix seconds).
pub fn list_depleted(conn: &Connection, now: i64) -> StoreResult<Vec<Client>> {
    many(
        conn,
        "WHERE enable = 1
           AND ((volume > 0 AND up + down > volume) OR (expiry > 0 AND expiry < ?1))",
        &[&now],
    )
}

/// `(name, credential)` of every enabled client linked to `inbound_id` that
/// holds a credential object under `key`.
pub fn credentials(
    conn: &Connection,
    inbound_id: i64,
    key: &str,
) -> StoreResult<Vec<(String, ExtensionBag)>> {
    let sql = format!(
        "SELECT id, name, json_extract(config, '$.' || ?2) FROM {TABLE}
         WHERE enable = 1 AND {LINKED} ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql).op("prepare credential query")?;
    let rows = stmt
        .query_map(params![inbound_id, key], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .op("query credentials")?
        .collect::<Result<Vec<_>, _>>()
        .op("query credentials")?;

    let mut users = Vec::with_capacity(rows.len());
    for (id, name, credential) in rows {
        let Some(text) = credential else { continue };
        match decode::<serde_json::Value>(TABLE, "config", id, &text)? {
            serde_json::Value::Object(bag) => users.push((name, bag)),
            _ => tracing::warn!(client = %name, key, "Credential is not an object, skipped"),
        }
    }
    Ok(users)
}

pub fn insert(conn: &Connection, client: &Client) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO clients (enable, name, desc, \"group\", inbounds, links, config,
                              up, down, volume, expiry)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            client.enable,
            client.name,
            client.desc,
            client.group,
            encode(&client.inbounds)?,
            encode(&client.links)?,
            encode(&client.config)?,
            client.up,
            client.down,
            client.volume,
            client.expiry
        ],
    )
    .op("insert client")?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, client: &Client) -> StoreResult<()> {
    conn.execute(
        "UPDATE clients SET enable = ?1, name = ?2, desc = ?3, \"group\" = ?4, inbounds = ?5,
                links = ?6, config = ?7, up = ?8, down = ?9, volume = ?10, expiry = ?11
         WHERE id = ?12",
        params![
            client.enable,
            client.name,
            client.desc,
            client.group,
            encode(&client.inbounds)?,
            encode(&client.links)?,
            encode(&client.config)?,
            client.up,
            client.down,
            client.volume,
            client.expiry,
            client.id
        ],
    )
    .op("update client")?;
    Ok(())
}

/// Rewrites the derived link columns only.
pub fn set_links(
    conn: &Connection,
    id: i64,
    inbounds: &[i64],
    links: &[Descriptor],
) -> StoreResult<()> {
    conn.execute(
        "UPDATE clients SET inbounds = ?1, links = ?2 WHERE id = ?3",
        params![encode(inbounds)?, encode(links)?, id],
    )
    .op("update client links")?;
    Ok(())
}

pub fn set_enable(conn: &Connection, id: i64, enable: bool) -> StoreResult<()> {
    conn.execute(
        "UPDATE clients SET enable = ?1 WHERE id = ?2",
        params![enable, id],
    )
    .op("update client enable")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use serde_json::json;

    fn client(name: &str, inbounds: Vec<i64>, config: serde_json::Value) -> Client {
        let mut c = Client::from_payload(json!({"name": name, "config": config})).unwrap();
        c.inbounds = inbounds;
        c
    }

    #[test]
    fn test_membership_and_credentials() {
        let store = Store::open_in_memory().unwrap();
        store
            .transaction(|tx| {
                insert(tx, &client("alice", vec![1, 2], json!({"vless": {"uuid": "a"}})))?;
                insert(tx, &client("bob", vec![2], json!({"trojan": {"password": "b"}})))?;
                let mut off = client("carol", vec![1], json!({"vless": {"uuid": "c"}}));
                off.enable = false;
                insert(tx, &off)?;
                Ok::<_, crate::store::StoreError>(())
            })
            .unwrap();

        store
            .read(|conn| {
                let linked: Vec<String> = list_linked(conn, 1)?.into_iter().map(|c| c.name).collect();
                assert_eq!(linked, vec!["alice", "carol"]);

                let users = credentials(conn, 1, "vless")?;
                assert_eq!(users.len(), 1);
                assert_eq!(users[0].0, "alice");
                assert_eq!(users[0].1["uuid"], "a");

                assert!(credentials(conn, 2, "vless")?.len() == 1);
                assert!(list_linked(conn, 3)?.is_empty());
                Ok::<_, crate::store::StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn test_depleted_query() {
        let store = Store::open_in_memory().unwrap();
        store
            .transaction(|tx| {
                let mut quota = client("quota", vec![], json!({}));
                quota.volume = 10;
                quota.up = 11;
                insert(tx, &quota)?;
                let mut old = client("old", vec![], json!({}));
                old.expiry = 50;
                insert(tx, &old)?;
                insert(tx, &client("fresh", vec![], json!({})))?;
                Ok::<_, crate::store::StoreError>(())
            })
            .unwrap();

        let depleted = store.read(|conn| list_depleted(conn, 100)).unwrap();
        let names: Vec<_> = depleted.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["quota", "old"]);
    }
}
