//! The library service: every operation the routing layer calls, with an
//! already-resolved actor identity and typed arguments.

pub mod content;
pub mod likes;
pub mod reports;
pub mod stats;
pub mod tags;
pub mod users;

use crate::db::DbPool;
use crate::error::LibraryResult;
use crate::precompute;
use crate::validators::ProjectRegistry;

/// Shared handle over the connection pool and the project registry, built
/// once at startup and passed by reference into the entry points.
pub struct Library {
    pool: DbPool,
    registry: ProjectRegistry,
}

impl Library {
    /// Wrap an already-migrated pool. Rebuilds the precomputation cache so
    /// reads are consistent from the first request.
    pub fn new(pool: DbPool, registry: ProjectRegistry) -> LibraryResult<Self> {
        let library = Self { pool, registry };
        {
            let conn = library.pool.get()?;
            precompute::recompute_all(&conn)?;
        }
        Ok(library)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::db;
    use crate::db::models::ContentUpload;
    use crate::validators::Project;

    /// Library over an in-memory database with an open "demo" project.
    pub fn library() -> Library {
        let registry = ProjectRegistry::new().with_project("demo", Project::new());
        Library::new(db::memory_pool(), registry).unwrap()
    }

    pub fn library_with(registry: ProjectRegistry) -> Library {
        Library::new(db::memory_pool(), registry).unwrap()
    }

    /// Insert a user directly, returning its id.
    pub fn user(library: &Library, external_id: &str, username: &str, moderator: bool) -> i64 {
        let conn = library.pool().get().unwrap();
        conn.execute(
            "INSERT INTO users (external_id, token, username, moderator)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![external_id, format!("token-{external_id}"), username, moderator],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn upload(title: &str, data: &[u8]) -> ContentUpload {
        ContentUpload {
            title: title.into(),
            meta: "{}".into(),
            data: data.to_vec(),
            tags: None,
        }
    }
}
