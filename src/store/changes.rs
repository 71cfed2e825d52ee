//! Append-only change log.

use rusqlite::{params, Connection};

use crate::model::{ChangeRecord, NewChange};
use crate::store::decode;
use crate::store::error::{QueryContext, StoreResult};

const TABLE: &str = "changes";

pub fn append(conn: &Connection, change: &NewChange<'_>) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO changes (date_time, actor, key, action, obj) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            change.date_time,
            change.actor,
            change.key,
            change.action,
            change.obj
        ],
    )
    .op("append change")?;
    Ok(conn.last_insert_rowid())
}

/// Number of records strictly newer than `since` (unix milliseconds).
pub fn count_since(conn: &Connection, since: i64) -> StoreResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM changes WHERE date_time > ?1",
        params![since],
        |row| row.get(0),
    )
    .op("count changes")
}

/// Number of records appended after change `id`.
pub fn count_after(conn: &Connection, id: i64) -> StoreResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM changes WHERE id > ?1", params![id], |row| row.get(0))
        .op("count changes after id")
}

/// Id of the newest record, 0 when the log is empty.
pub fn latest_id(conn: &Connection) -> StoreResult<i64> {
    conn.query_row("SELECT COALESCE(MAX(id), 0) FROM changes", [], |row| row.get(0))
        .op("latest change id")
}

/// Newest-first records, optionally filtered by actor and class.
pub fn query(
    conn: &Connection,
    actor: Option<&str>,
    key: Option<&str>,
    limit: i64,
) -> StoreResult<Vec<ChangeRecord>> {
    if limit <= 0 {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare(
            "SELECT id, date_time, actor, key, action, obj FROM changes
             WHERE (?1 IS NULL OR actor = ?1) AND (?2 IS NULL OR key = ?2)
             ORDER BY date_time DESC, id DESC LIMIT ?3",
        )
        .op("prepare change query")?;
    let rows = stmt
        .query_map(params![actor, key, limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .op("query changes")?
        .collect::<Result<Vec<_>, _>>()
        .op("query changes")?;

    rows.into_iter()
        .map(|(id, date_time, actor, key, action, obj)| {
            // Payloads are stored raw; non-JSON ones (e.g. a bare tag) read back as strings.
            let obj = decode(TABLE, "obj", id, &obj)
                .unwrap_or(serde_json::Value::String(obj));
            Ok(ChangeRecord {
                id,
                date_time,
                actor,
                key,
                action,
                obj,
            })
        })
        .collect()
}

/// Bulk reset of the log.
pub fn clear(conn: &Connection) -> StoreResult<usize> {
    conn.execute("DELETE FROM changes", []).op("clear changes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn record(conn: &Connection, at: i64, actor: &str, key: &str, obj: &str) {
        append(
            conn,
            &NewChange {
                date_time: at,
                actor,
                key,
                action: "edit",
                obj,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_query_filters_and_orders() {
        let store = Store::open_in_memory().unwrap();
        store
            .read(|conn| {
                record(conn, 10, "admin", "clients", r#"{"name":"a"}"#);
                record(conn, 20, "ops", "inbounds", r#""in1""#);
                record(conn, 30, "admin", "inbounds", "raw text");

                let all = query(conn, None, None, 10)?;
                assert_eq!(all.iter().map(|c| c.date_time).collect::<Vec<_>>(), vec![30, 20, 10]);
                assert_eq!(all[0].obj, serde_json::json!("raw text"));
                assert_eq!(all[1].obj, serde_json::json!("in1"));

                let admin = query(conn, Some("admin"), Some("inbounds"), 10)?;
                assert_eq!(admin.len(), 1);
                assert_eq!(admin[0].date_time, 30);

                assert!(query(conn, None, None, 0)?.is_empty());
                assert_eq!(query(conn, None, None, 2)?.len(), 2);
                assert_eq!(count_since(conn, 15)?, 2);
                assert_eq!(latest_id(conn)?, 3);
                assert_eq!(count_after(conn, 1)?, 2);
                Ok::<_, crate::store::StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn test_ids_keep_growing_after_clear() {
        let store = Store::open_in_memory().unwrap();
        store
            .read(|conn| {
                assert_eq!(latest_id(conn)?, 0);
                record(conn, 10, "admin", "clients", "{}");
                record(conn, 20, "admin", "clients", "{}");
                clear(conn)?;
                assert_eq!(latest_id(conn)?, 0);

                record(conn, 30, "admin", "clients", "{}");
                assert_eq!(latest_id(conn)?, 3);
                assert_eq!(count_after(conn, 2)?, 1);
                Ok::<_, crate::store::StoreError>(())
            })
            .unwrap();
    }
}
