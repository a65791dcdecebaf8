//! Like mutations: idempotent set membership per (user, content).

use rusqlite::params;

use crate::error::{LibraryError, LibraryResult};
use crate::guards;
use crate::library::Library;
use crate::precompute;

impl Library {
    pub async fn add_like(&self, actor: Option<i64>, contentid: i64) -> LibraryResult<()> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        let conn = self.pool.get()?;

        if !guards::content_exists(&conn, contentid)? {
            return Err(LibraryError::NotFound);
        }
        if guards::has_liked(&conn, actor, contentid)? {
            return Err(LibraryError::Conflict("Already liked".into()));
        }

        conn.execute(
            "INSERT INTO likes (userid, contentid) VALUES (?1, ?2)",
            params![actor, contentid],
        )?;
        precompute::recompute(&conn, contentid)?;
        Ok(())
    }

    pub async fn remove_like(&self, actor: Option<i64>, contentid: i64) -> LibraryResult<()> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        let conn = self.pool.get()?;

        if !guards::has_liked(&conn, actor, contentid)? {
            return Err(LibraryError::Conflict("Not liked previously".into()));
        }

        conn.execute(
            "DELETE FROM likes WHERE userid = ?1 AND contentid = ?2",
            params![actor, contentid],
        )?;
        precompute::recompute(&conn, contentid)?;
        Ok(())
    }
}
