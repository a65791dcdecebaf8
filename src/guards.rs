//! Access-control and existence checks shared by the mutation entry points.

use rusqlite::Connection;

use crate::error::{LibraryError, LibraryResult};

fn count(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> rusqlite::Result<i64> {
    conn.query_row(sql, params, |row| row.get(0))
}

pub fn user_exists(conn: &Connection, userid: i64) -> rusqlite::Result<bool> {
    Ok(count(
        conn,
        "SELECT COUNT(*) FROM users WHERE oid = ?1",
        &[&userid],
    )? > 0)
}

pub fn content_exists(conn: &Connection, contentid: i64) -> rusqlite::Result<bool> {
    Ok(count(
        conn,
        "SELECT COUNT(*) FROM content WHERE oid = ?1",
        &[&contentid],
    )? > 0)
}

/// True iff the content's owner is the given user.
pub fn owns_content(conn: &Connection, contentid: i64, userid: i64) -> rusqlite::Result<bool> {
    Ok(count(
        conn,
        "SELECT COUNT(*) FROM content WHERE userid = ?1 AND oid = ?2",
        &[&userid, &contentid],
    )? > 0)
}

pub fn is_moderator(conn: &Connection, userid: i64) -> rusqlite::Result<bool> {
    Ok(count(
        conn,
        "SELECT COUNT(*) FROM users WHERE oid = ?1 AND moderator = 1",
        &[&userid],
    )? > 0)
}

pub fn is_banned(conn: &Connection, userid: i64) -> rusqlite::Result<bool> {
    Ok(count(
        conn,
        "SELECT COUNT(*) FROM users WHERE oid = ?1 AND banned = 1",
        &[&userid],
    )? > 0)
}

pub fn has_liked(conn: &Connection, userid: i64, contentid: i64) -> rusqlite::Result<bool> {
    Ok(count(
        conn,
        "SELECT COUNT(*) FROM likes WHERE userid = ?1 AND contentid = ?2",
        &[&userid, &contentid],
    )? > 0)
}

pub fn has_reported(
    conn: &Connection,
    userid: i64,
    contentid: i64,
    reason: &str,
) -> rusqlite::Result<bool> {
    Ok(count(
        conn,
        "SELECT COUNT(*) FROM reports WHERE userid = ?1 AND contentid = ?2 AND reason = ?3",
        &[&userid, &contentid, &reason],
    )? > 0)
}

pub fn has_tag(conn: &Connection, contentid: i64, tag: &str) -> rusqlite::Result<bool> {
    Ok(count(
        conn,
        "SELECT COUNT(*) FROM tags WHERE contentid = ?1 AND tag = ?2",
        &[&contentid, &tag],
    )? > 0)
}

/// Content mutations require the owner or a moderator; missing content is
/// reported before the permission check.
pub fn require_owner_or_moderator(
    conn: &Connection,
    contentid: i64,
    userid: i64,
) -> LibraryResult<()> {
    if !content_exists(conn, contentid)? {
        return Err(LibraryError::NotFound);
    }
    if !owns_content(conn, contentid, userid)? && !is_moderator(conn, userid)? {
        return Err(LibraryError::Forbidden);
    }
    Ok(())
}

/// Duplicate-payload check within a project.
pub fn duplicate_content(
    conn: &Connection,
    project: &str,
    data: &[u8],
) -> rusqlite::Result<bool> {
    Ok(count(
        conn,
        "SELECT COUNT(*) FROM content WHERE project = ?1 AND data = ?2",
        &[&project, &data],
    )? > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn seeded() -> db::DbPool {
        let pool = db::memory_pool();
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO users (external_id, token, username, moderator, banned)
                 VALUES ('a', 't1', 'alice', 1, 0), ('b', 't2', 'bob', 0, 1)",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO content (userid, project, title, meta, data) VALUES (1, 'demo', 'Car', '{}', x'aa')",
                [],
            )
            .unwrap();
        }
        pool
    }

    #[test]
    fn ownership_and_flags() {
        let pool = seeded();
        let conn = pool.get().unwrap();

        assert!(owns_content(&conn, 1, 1).unwrap());
        assert!(!owns_content(&conn, 1, 2).unwrap());
        assert!(is_moderator(&conn, 1).unwrap());
        assert!(!is_moderator(&conn, 2).unwrap());
        assert!(is_banned(&conn, 2).unwrap());
        assert!(!is_banned(&conn, 1).unwrap());
        assert!(user_exists(&conn, 2).unwrap());
        assert!(!user_exists(&conn, 99).unwrap());
    }

    #[test]
    fn relation_membership_checks() {
        let pool = seeded();
        let conn = pool.get().unwrap();

        assert!(!has_liked(&conn, 2, 1).unwrap());
        conn.execute("INSERT INTO likes (userid, contentid) VALUES (2, 1)", [])
            .unwrap();
        assert!(has_liked(&conn, 2, 1).unwrap());

        assert!(!has_tag(&conn, 1, "vehicle").unwrap());
        conn.execute("INSERT INTO tags (contentid, tag) VALUES (1, 'vehicle')", [])
            .unwrap();
        assert!(has_tag(&conn, 1, "vehicle").unwrap());

        assert!(!has_reported(&conn, 2, 1, "DEFAULT").unwrap());
        conn.execute(
            "INSERT INTO reports (userid, contentid, reason) VALUES (2, 1, 'DEFAULT')",
            [],
        )
        .unwrap();
        assert!(has_reported(&conn, 2, 1, "DEFAULT").unwrap());
        assert!(!has_reported(&conn, 2, 1, "COUNTER_DEFAULT").unwrap());
    }

    #[test]
    fn duplicate_payload_is_scoped_to_project() {
        let pool = seeded();
        let conn = pool.get().unwrap();

        assert!(duplicate_content(&conn, "demo", &[0xaa]).unwrap());
        assert!(!duplicate_content(&conn, "demo", &[0xbb]).unwrap());
        assert!(!duplicate_content(&conn, "other", &[0xaa]).unwrap());
    }
}
