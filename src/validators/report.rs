//! Report-driven auto-tagging.

use async_trait::async_trait;
use rusqlite::params;

use crate::db::DbPool;
use crate::error::LibraryResult;
use crate::guards;
use crate::precompute;
use crate::validators::Validator;

/// After each report, tags the content once reports with the configured
/// reason outweigh its likes (`1 + likes/10 - reports < 0`). The tag write
/// refreshes the content's cache row itself, so listings pick it up
/// immediately.
pub struct ReportThresholdValidator {
    reason: String,
    tag: String,
}

impl ReportThresholdValidator {
    pub fn new(reason: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            tag: tag.into(),
        }
    }
}

impl Default for ReportThresholdValidator {
    fn default() -> Self {
        Self::new("INVALID", "invalid")
    }
}

#[async_trait]
impl Validator for ReportThresholdValidator {
    async fn post_report(
        &self,
        db: &DbPool,
        _actor: i64,
        contentid: i64,
        _reason: &str,
    ) -> LibraryResult<Option<String>> {
        let conn = db.get()?;

        // Count live, not from the cache: this hook runs before the
        // mutation path's own recompute
        let likes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE contentid = ?1",
            params![contentid],
            |row| row.get(0),
        )?;
        let reports: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE contentid = ?1 AND reason = ?2",
            params![contentid, self.reason],
            |row| row.get(0),
        )?;

        if 1.0 + likes as f64 / 10.0 - reports as f64 >= 0.0 {
            return Ok(None);
        }
        if guards::has_tag(&conn, contentid, &self.tag)? {
            return Ok(None);
        }

        conn.execute(
            "INSERT INTO tags (contentid, tag) VALUES (?1, ?2)",
            params![contentid, self.tag],
        )?;
        precompute::recompute(&conn, contentid)?;

        Ok(Some(format!("{contentid} flagged as {}", self.tag)))
    }
}
