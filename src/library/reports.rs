//! Report mutations. Reasons are free-form project strings; the DEFAULT and
//! COUNTER_DEFAULT reasons feed the visibility score.

use rusqlite::params;

use crate::error::{LibraryError, LibraryResult};
use crate::guards;
use crate::library::Library;
use crate::precompute;

impl Library {
    pub async fn add_report(
        &self,
        actor: Option<i64>,
        project: &str,
        contentid: i64,
        reason: &str,
    ) -> LibraryResult<()> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;

        self.registry
            .resolve(project)
            .validate_report(&self.pool, actor, contentid, reason)
            .await?;

        {
            let conn = self.pool.get()?;
            if !guards::content_exists(&conn, contentid)? {
                return Err(LibraryError::NotFound);
            }
            if guards::has_reported(&conn, actor, contentid, reason)? {
                return Err(LibraryError::Conflict("Already reported".into()));
            }
            conn.execute(
                "INSERT INTO reports (userid, contentid, reason) VALUES (?1, ?2, ?3)",
                params![actor, contentid, reason],
            )?;
        }

        for message in self
            .registry
            .resolve(project)
            .notify_report(&self.pool, actor, contentid, reason)
            .await
        {
            tracing::info!(project, contentid, reason, "{message}");
        }

        let conn = self.pool.get()?;
        precompute::recompute(&conn, contentid)?;
        Ok(())
    }

    pub async fn remove_report(
        &self,
        actor: Option<i64>,
        contentid: i64,
        reason: &str,
    ) -> LibraryResult<()> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        let conn = self.pool.get()?;

        if !guards::has_reported(&conn, actor, contentid, reason)? {
            return Err(LibraryError::Conflict("Not reported previously".into()));
        }

        conn.execute(
            "DELETE FROM reports WHERE userid = ?1 AND contentid = ?2 AND reason = ?3",
            params![actor, contentid, reason],
        )?;
        precompute::recompute(&conn, contentid)?;
        Ok(())
    }
}
