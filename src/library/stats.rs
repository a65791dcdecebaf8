//! Library-wide counters for the front page and the maintenance binary.

use crate::db::models::LibraryStats;
use crate::error::LibraryResult;
use crate::library::Library;

impl Library {
    pub async fn stats(&self) -> LibraryResult<LibraryStats> {
        let conn = self.pool.get()?;

        let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };

        let content = count("SELECT COUNT(*) FROM content")?;
        let liked_content = count(
            "SELECT COUNT(*)
             FROM content
             INNER JOIN precomputation ON content.oid = precomputation.contentid
             WHERE precomputation.likes > 10",
        )?;
        let users = count("SELECT COUNT(*) FROM users")?;
        let banned_users = count("SELECT COUNT(*) FROM users WHERE banned = 1")?;
        let likes = count("SELECT COUNT(*) FROM likes")?;
        let reports = count("SELECT COUNT(*) FROM reports")?;

        let top_tags = {
            let mut stmt = conn.prepare(
                "SELECT tag
                 FROM tags
                 GROUP BY tag
                 ORDER BY COUNT(*) DESC
                 LIMIT 33",
            )?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        Ok(LibraryStats {
            content,
            liked_content,
            users,
            banned_users,
            likes,
            reports,
            top_tags,
        })
    }
}
