//! In-memory databases shaped like a LEGI dump, for tests.

use rusqlite::{params, Connection};

/// `(nature, num, nor, titrefull_s)` of one version row.
pub type Version<'a> = (
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
);

pub fn load(conn: &Connection, fixture: &str) {
    let sql = std::fs::read_to_string(format!("tests/fixtures/{}.sql", fixture)).unwrap();
    conn.execute_batch(&sql).unwrap();
}

pub fn versions_db(rows: &[Version<'_>]) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
    load(&conn, "textes_versions");
    for (nature, num, nor, titrefull_s) in rows {
        conn.execute(
            "INSERT INTO textes_versions (nature, num, nor, titrefull_s) VALUES (?1, ?2, ?3, ?4)",
            params![nature, num, nor, titrefull_s],
        )
        .unwrap();
    }
    conn
}

/// `texte_id` of every version, by version id.
pub fn texte_ids(conn: &Connection) -> Vec<Option<i64>> {
    let mut stmt = conn
        .prepare("SELECT texte_id FROM textes_versions ORDER BY id")
        .unwrap();
    let ids = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap();
    ids
}

pub fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |r| r.get(0)).unwrap()
}
