//! Content lifecycle: submission, update, deletion, single reads and the
//! filtered listing entry point.
//!
//! Upload shape: pre-upload validation (fail-fast, no row on rejection),
//! row insert, post-upload notification (side effects applied), recompute.
//! Updates follow the same shape with the version bumped in place.

use chrono::Utc;
use rusqlite::{params, params_from_iter};

use crate::db::models::{
    split_tags, ContentDetail, ContentSummary, ContentUpload, Meta, ProjectSummary,
};
use crate::error::{LibraryError, LibraryResult};
use crate::guards;
use crate::library::Library;
use crate::precompute;
use crate::query::{self, ListOptions};

fn check_tags(tags: &Option<Vec<String>>) -> LibraryResult<()> {
    if let Some(tags) = tags {
        for tag in tags {
            if tag.contains(',') {
                return Err(LibraryError::InvalidArgument(
                    "Tag contains invalid characters".into(),
                ));
            }
        }
    }
    Ok(())
}

impl Library {
    /// Submit new content to a project, returning its id.
    pub async fn add_content(
        &self,
        actor: Option<i64>,
        project: &str,
        mut draft: ContentUpload,
    ) -> LibraryResult<i64> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        check_tags(&draft.tags)?;

        {
            let conn = self.pool.get()?;
            if guards::duplicate_content(&conn, project, &draft.data)? {
                return Err(LibraryError::Conflict("Duplicate found".into()));
            }
        }

        self.registry
            .resolve(project)
            .validate_upload(&self.pool, actor, &mut draft)
            .await?;

        let contentid = {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO content (userid, project, title, meta, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![actor, project, draft.title, draft.meta, draft.data],
            )?;
            let contentid = conn.last_insert_rowid();
            if let Some(tags) = &draft.tags {
                for tag in tags {
                    conn.execute(
                        "INSERT INTO tags (contentid, tag) VALUES (?1, ?2)",
                        params![contentid, tag],
                    )?;
                }
            }
            contentid
        };

        for message in self
            .registry
            .resolve(project)
            .notify_upload(&self.pool, actor, contentid)
            .await
        {
            tracing::info!(project, contentid, "{message}");
        }

        let conn = self.pool.get()?;
        precompute::recompute(&conn, contentid)?;
        Ok(contentid)
    }

    /// Replace title/meta/data in place, bumping the version. When the draft
    /// carries a tag set, the content's tags are replaced atomically with the
    /// row update.
    pub async fn update_content(
        &self,
        actor: Option<i64>,
        project: &str,
        contentid: i64,
        mut draft: ContentUpload,
    ) -> LibraryResult<()> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        check_tags(&draft.tags)?;

        {
            let conn = self.pool.get()?;
            guards::require_owner_or_moderator(&conn, contentid, actor)?;
        }

        self.registry
            .resolve(project)
            .validate_upload(&self.pool, actor, &mut draft)
            .await?;

        {
            let conn = self.pool.get()?;
            conn.execute("BEGIN IMMEDIATE", [])?;
            let result: LibraryResult<()> = (|| {
                let updated = conn.execute(
                    "UPDATE content SET title = ?1, meta = ?2, data = ?3, version = version + 1
                     WHERE project = ?4 AND oid = ?5",
                    params![draft.title, draft.meta, draft.data, project, contentid],
                )?;
                if updated == 0 {
                    return Err(LibraryError::NotFound);
                }
                if let Some(tags) = &draft.tags {
                    conn.execute("DELETE FROM tags WHERE contentid = ?1", params![contentid])?;
                    for tag in tags {
                        conn.execute(
                            "INSERT INTO tags (contentid, tag) VALUES (?1, ?2)",
                            params![contentid, tag],
                        )?;
                    }
                }
                Ok(())
            })();
            match result {
                Ok(()) => {
                    conn.execute("COMMIT", [])?;
                }
                Err(err) => {
                    conn.execute("ROLLBACK", [])?;
                    return Err(err);
                }
            }
        }

        for message in self
            .registry
            .resolve(project)
            .notify_upload(&self.pool, actor, contentid)
            .await
        {
            tracing::info!(project, contentid, "{message}");
        }

        let conn = self.pool.get()?;
        precompute::recompute(&conn, contentid)?;
        Ok(())
    }

    /// Delete content and everything hanging off it.
    pub async fn delete_content(&self, actor: Option<i64>, contentid: i64) -> LibraryResult<()> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        let conn = self.pool.get()?;
        guards::require_owner_or_moderator(&conn, contentid, actor)?;

        conn.execute("BEGIN IMMEDIATE", [])?;
        let result: LibraryResult<()> = (|| {
            conn.execute("DELETE FROM likes WHERE contentid = ?1", params![contentid])?;
            conn.execute("DELETE FROM tags WHERE contentid = ?1", params![contentid])?;
            conn.execute(
                "DELETE FROM reports WHERE contentid = ?1",
                params![contentid],
            )?;
            precompute::remove(&conn, contentid)?;
            conn.execute("DELETE FROM content WHERE oid = ?1", params![contentid])?;
            Ok(())
        })();
        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                Ok(())
            }
            Err(err) => {
                conn.execute("ROLLBACK", [])?;
                Err(err)
            }
        }
    }

    /// Full projection of a single content item.
    pub async fn get_content(&self, contentid: i64, parse_meta: bool) -> LibraryResult<ContentDetail> {
        let conn = self.pool.get()?;
        let result = conn.query_row(&query::detail_select(), params![contentid], |row| {
            let tags: String = row.get(6)?;
            let raw_meta: String = row.get(7)?;
            Ok(ContentDetail {
                contentid: row.get(0)?,
                userid: row.get(1)?,
                username: row.get(2)?,
                title: row.get(3)?,
                version: row.get(4)?,
                likes: row.get(5)?,
                tags: split_tags(&tags),
                meta: if parse_meta {
                    Meta::parsed(&raw_meta)
                } else {
                    Meta::Raw(raw_meta)
                },
                data: row.get(8)?,
            })
        });
        match result {
            Ok(detail) => Ok(detail),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(LibraryError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Filtered, ordered, paginated listing over the precomputed aggregates.
    pub async fn list_content(
        &self,
        actor: Option<i64>,
        project: &str,
        opts: &ListOptions,
    ) -> LibraryResult<Vec<ContentSummary>> {
        let seed = query::recommendation_seed(opts.userid.or(actor), Utc::now());
        let list = query::build_list_query(project, opts, actor, seed)?;

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&list.sql)?;
        let rows = stmt.query_map(params_from_iter(list.params.iter()), |row| {
            query::summary_from_row(row, opts.include_meta, opts.parse_meta)
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every project name present in storage, busiest first.
    pub async fn list_projects(&self) -> LibraryResult<Vec<ProjectSummary>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT project, COUNT(*) AS content_count
             FROM content
             GROUP BY project
             ORDER BY content_count DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProjectSummary {
                name: row.get(0)?,
                content_count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Re-run post-upload hooks over a whole project or one item, returning
    /// the ordered handler log. Moderator only.
    pub async fn run_post_process(
        &self,
        actor: Option<i64>,
        project: &str,
        contentid: Option<i64>,
    ) -> LibraryResult<Vec<String>> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        let ids: Vec<i64> = {
            let conn = self.pool.get()?;
            if !guards::is_moderator(&conn, actor)? {
                return Err(LibraryError::Forbidden);
            }
            match contentid {
                Some(id) => {
                    if !guards::content_exists(&conn, id)? {
                        return Err(LibraryError::NotFound);
                    }
                    vec![id]
                }
                None => {
                    let mut stmt =
                        conn.prepare("SELECT oid FROM content WHERE project = ?1 ORDER BY oid")?;
                    let rows = stmt.query_map(params![project], |row| row.get(0))?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
            }
        };

        let mut log = Vec::new();
        for id in ids {
            log.extend(
                self.registry
                    .resolve(project)
                    .notify_upload(&self.pool, actor, id)
                    .await,
            );
        }
        Ok(log)
    }
}
