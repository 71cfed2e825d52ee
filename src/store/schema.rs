//! Table definitions.

use rusqlite::Connection;

use crate::store::error::{QueryContext, StoreResult};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        server TEXT NOT NULL DEFAULT '{}',
        client TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS inbounds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL,
        tag TEXT NOT NULL UNIQUE,
        tls_id INTEGER,
        options TEXT NOT NULL DEFAULT '{}',
        out_json TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS outbounds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL,
        tag TEXT NOT NULL UNIQUE,
        options TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS endpoints (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL,
        tag TEXT NOT NULL UNIQUE,
        options TEXT NOT NULL DEFAULT '{}',
        ext TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS clients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        enable INTEGER NOT NULL DEFAULT 1,
        name TEXT NOT NULL UNIQUE,
        desc TEXT NOT NULL DEFAULT '',
        \"group\" TEXT NOT NULL DEFAULT '',
        inbounds TEXT NOT NULL DEFAULT '[]',
        links TEXT NOT NULL DEFAULT '[]',
        config TEXT NOT NULL DEFAULT '{}',
        up INTEGER NOT NULL DEFAULT 0,
        down INTEGER NOT NULL DEFAULT 0,
        volume INTEGER NOT NULL DEFAULT 0,
        expiry INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS changes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date_time INTEGER NOT NULL,
        actor TEXT NOT NULL,
        key TEXT NOT NULL,
        action TEXT NOT NULL,
        obj TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS changes_date_time ON changes (date_time);
";

pub(crate) fn init(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SCHEMA).op("init schema")
}
