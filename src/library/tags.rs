//! Tag mutations and listings. Tags are owner/moderator-curated strings;
//! the comma is reserved as the cache's join separator and rejected.

use rusqlite::params;

use crate::error::{LibraryError, LibraryResult};
use crate::guards;
use crate::library::Library;
use crate::precompute;

impl Library {
    pub async fn add_tag(
        &self,
        actor: Option<i64>,
        contentid: i64,
        tag: &str,
    ) -> LibraryResult<()> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        if tag.contains(',') {
            return Err(LibraryError::InvalidArgument(
                "Tag contains invalid characters".into(),
            ));
        }

        let conn = self.pool.get()?;
        guards::require_owner_or_moderator(&conn, contentid, actor)?;
        if guards::has_tag(&conn, contentid, tag)? {
            return Err(LibraryError::Conflict("Already tagged".into()));
        }

        conn.execute(
            "INSERT INTO tags (contentid, tag) VALUES (?1, ?2)",
            params![contentid, tag],
        )?;
        precompute::recompute(&conn, contentid)?;
        Ok(())
    }

    pub async fn remove_tag(
        &self,
        actor: Option<i64>,
        contentid: i64,
        tag: &str,
    ) -> LibraryResult<()> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        let conn = self.pool.get()?;
        guards::require_owner_or_moderator(&conn, contentid, actor)?;
        if !guards::has_tag(&conn, contentid, tag)? {
            return Err(LibraryError::Conflict("Not tagged".into()));
        }

        conn.execute(
            "DELETE FROM tags WHERE contentid = ?1 AND tag = ?2",
            params![contentid, tag],
        )?;
        precompute::recompute(&conn, contentid)?;
        Ok(())
    }

    /// Tags of one content item, in insertion order.
    pub async fn list_content_tags(&self, contentid: i64) -> LibraryResult<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT tag FROM tags WHERE contentid = ?1")?;
        let rows = stmt.query_map(params![contentid], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The most common tags of a project, with their usage counts.
    pub async fn list_project_tags(
        &self,
        project: &str,
        limit: u32,
        offset: u32,
    ) -> LibraryResult<Vec<(String, i64)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT tag, COUNT(*) AS count
             FROM tags
             INNER JOIN content ON tags.contentid = content.oid
             WHERE content.project = ?1
             GROUP BY tag
             ORDER BY count DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(params![project, limit, offset], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
