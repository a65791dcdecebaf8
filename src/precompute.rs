//! Precomputation engine: keeps the per-content aggregate cache row
//! (like count, joined tag list, report counts) consistent with the
//! likes/tags/reports tables.
//!
//! Policy is targeted-immediate: every mutating operation recomputes the
//! affected row synchronously before returning, so a read following a write
//! in the same request always sees fresh aggregates. The recompute is an
//! idempotent full overwrite of one row; a failure before the write leaves
//! the previous row intact and is safe to retry.

use rusqlite::{params, Connection};

use crate::db::models::{COUNTER_REASON, DEFAULT_REASON};

const RECOMPUTE_SELECT: &str = "
    SELECT c.oid,
           CASE WHEN tagged.c_tags IS NULL THEN '' ELSE tagged.c_tags END       AS tags,
           CASE WHEN liked.c_likes IS NULL THEN 0 ELSE liked.c_likes END        AS likes,
           CASE WHEN reported.c_reports IS NULL THEN 0 ELSE reported.c_reports END AS reports,
           CASE WHEN countered.c_reports IS NULL THEN 0 ELSE countered.c_reports END AS counter_reports
    FROM content c

             LEFT JOIN (SELECT likes.contentid, COUNT(*) AS c_likes
                        FROM likes
                        GROUP BY likes.contentid) liked ON liked.contentid = c.oid

             LEFT JOIN (SELECT tags.contentid, GROUP_CONCAT(tag, ',') AS c_tags
                        FROM tags
                        GROUP BY tags.contentid) tagged ON tagged.contentid = c.oid

             LEFT JOIN (SELECT reports.contentid, COUNT(*) AS c_reports
                        FROM reports
                        WHERE reports.reason = ?1
                        GROUP BY reports.contentid) reported ON reported.contentid = c.oid

             LEFT JOIN (SELECT reports.contentid, COUNT(*) AS c_reports
                        FROM reports
                        WHERE reports.reason = ?2
                        GROUP BY reports.contentid) countered ON countered.contentid = c.oid
";

/// Recompute the aggregate row for a single content item.
pub fn recompute(conn: &Connection, contentid: i64) -> rusqlite::Result<()> {
    let sql = format!(
        "INSERT OR REPLACE INTO precomputation (contentid, tags, likes, reports, counter_reports)
         {RECOMPUTE_SELECT}
         WHERE c.oid = ?3"
    );
    conn.execute(&sql, params![DEFAULT_REASON, COUNTER_REASON, contentid])?;
    Ok(())
}

/// Rebuild the whole cache in one statement. Used after migrations and by the
/// maintenance binary; idempotent, so running it concurrently with mutations
/// only ever reflects whichever state existed at recompute time.
pub fn recompute_all(conn: &Connection) -> rusqlite::Result<usize> {
    let sql = format!(
        "INSERT OR REPLACE INTO precomputation (contentid, tags, likes, reports, counter_reports)
         {RECOMPUTE_SELECT}"
    );
    conn.execute(&sql, params![DEFAULT_REASON, COUNTER_REASON])
}

/// Drop the cache row for deleted content.
pub fn remove(conn: &Connection, contentid: i64) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM precomputation WHERE contentid = ?1",
        params![contentid],
    )?;
    Ok(())
}
