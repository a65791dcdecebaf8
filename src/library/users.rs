//! User management: the authentication boundary (token resolution, login
//! upsert) and moderator administration.

use std::str::FromStr;

use rusqlite::{params, OptionalExtension};

use crate::db::models::{BanEntry, UserSummary};
use crate::error::{LibraryError, LibraryResult};
use crate::guards;
use crate::library::Library;
use crate::precompute;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOrder {
    Date,
    Submissions,
    LikesGiven,
    LikesReceived,
}

impl FromStr for UserOrder {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(UserOrder::Date),
            "submissions" => Ok(UserOrder::Submissions),
            "likes_given" => Ok(UserOrder::LikesGiven),
            "likes_received" => Ok(UserOrder::LikesReceived),
            other => Err(LibraryError::InvalidArgument(format!(
                "Invalid order '{other}'"
            ))),
        }
    }
}

const USER_AGGREGATE_SELECT: &str = "
    SELECT users.oid,
           users.username,
           users.moderator,
           COALESCE(submitted.submission_count, 0) AS submission_count,
           COALESCE(given.likes_given, 0)          AS likes_given,
           COALESCE(received.likes_received, 0)    AS likes_received
    FROM users

    LEFT JOIN (SELECT content.userid, COUNT(content.oid) AS submission_count
               FROM content
               WHERE content.project = ?1
               GROUP BY content.userid) submitted ON submitted.userid = users.oid

    LEFT JOIN (SELECT likes.userid, COUNT(*) AS likes_given
               FROM likes
               INNER JOIN content ON likes.contentid = content.oid
               WHERE content.project = ?1
               GROUP BY likes.userid) given ON given.userid = users.oid

    LEFT JOIN (SELECT c.userid, SUM(COALESCE(precomputation.likes, 0)) AS likes_received
               FROM content c
               LEFT JOIN precomputation ON precomputation.contentid = c.oid
               WHERE c.project = ?1
               GROUP BY c.userid) received ON received.userid = users.oid
";

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        userid: row.get(0)?,
        username: row.get(1)?,
        moderator: row.get(2)?,
        submission_count: row.get(3)?,
        likes_given: row.get(4)?,
        likes_received: row.get(5)?,
    })
}

impl Library {
    /// The `resolve_actor` boundary: map a bearer token to a user id.
    pub async fn resolve_token(&self, token: &str) -> LibraryResult<Option<i64>> {
        if token.is_empty() {
            return Ok(None);
        }
        let conn = self.pool.get()?;
        Ok(conn
            .query_row(
                "SELECT oid FROM users WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// The `upsert_login` boundary: called after external authentication
    /// verified `external_id`. Creates the account on first login, refreshes
    /// username and token afterwards. Tokens are unique: any other account
    /// holding the same token loses it.
    pub async fn login(
        &self,
        external_id: &str,
        username: &str,
        token: &str,
    ) -> LibraryResult<i64> {
        let conn = self.pool.get()?;

        conn.execute(
            "UPDATE users SET token = '' WHERE token = ?1",
            params![token],
        )?;

        let updated = conn.execute(
            "UPDATE users SET username = ?1, token = ?2 WHERE external_id = ?3",
            params![username, token, external_id],
        )?;
        if updated == 0 {
            conn.execute(
                "INSERT INTO users (external_id, token, username, moderator, banned)
                 VALUES (?1, ?2, ?3, 0, 0)",
                params![external_id, token, username],
            )?;
        }

        Ok(conn.query_row(
            "SELECT oid FROM users WHERE external_id = ?1",
            params![external_id],
            |row| row.get(0),
        )?)
    }

    /// One user's per-project aggregates. Banned users are not listed.
    pub async fn get_user(&self, project: &str, userid: i64) -> LibraryResult<UserSummary> {
        let conn = self.pool.get()?;
        let sql = format!("{USER_AGGREGATE_SELECT} WHERE users.banned = 0 AND users.oid = ?2");
        conn.query_row(&sql, params![project, userid], summary_from_row)
            .optional()?
            .ok_or(LibraryError::NotFound)
    }

    pub async fn list_users(
        &self,
        project: &str,
        limit: u32,
        offset: u32,
        order: UserOrder,
        descending: bool,
    ) -> LibraryResult<Vec<UserSummary>> {
        let order_key = match order {
            UserOrder::Date => "users.oid",
            UserOrder::Submissions => "submission_count",
            UserOrder::LikesGiven => "likes_given",
            UserOrder::LikesReceived => "likes_received",
        };
        let sql = format!(
            "{USER_AGGREGATE_SELECT}
             WHERE users.banned = 0
             ORDER BY {order_key} {}
             LIMIT ?2 OFFSET ?3",
            if descending { "DESC" } else { "ASC" }
        );

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![project, limit, offset], summary_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Banned accounts, moderator only.
    pub async fn list_banned(&self, actor: Option<i64>) -> LibraryResult<Vec<BanEntry>> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        let conn = self.pool.get()?;
        if !guards::is_moderator(&conn, actor)? {
            return Err(LibraryError::Forbidden);
        }

        let mut stmt =
            conn.prepare("SELECT oid, username FROM users WHERE banned = 1 ORDER BY oid")?;
        let rows = stmt.query_map([], |row| {
            Ok(BanEntry {
                userid: row.get(0)?,
                username: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Moderator administration: flip ban/moderator flags and optionally
    /// purge everything the target contributed. Purging removes the user's
    /// content (with its relations) and their likes on other content, then
    /// recomputes every row those likes fed.
    pub async fn set_user(
        &self,
        actor: Option<i64>,
        userid: i64,
        banned: Option<bool>,
        moderator: Option<bool>,
        purge: bool,
    ) -> LibraryResult<()> {
        let actor = actor.ok_or(LibraryError::Unauthorized)?;
        let conn = self.pool.get()?;
        if !guards::is_moderator(&conn, actor)? {
            return Err(LibraryError::Forbidden);
        }
        if !guards::user_exists(&conn, userid)? {
            return Err(LibraryError::NotFound);
        }

        if let Some(banned) = banned {
            conn.execute(
                "UPDATE users SET banned = ?1 WHERE oid = ?2",
                params![banned, userid],
            )?;
        }
        if let Some(moderator) = moderator {
            conn.execute(
                "UPDATE users SET moderator = ?1 WHERE oid = ?2",
                params![moderator, userid],
            )?;
        }

        if purge {
            // Rows liked by the target on other content keep existing and
            // need their aggregates refreshed after the likes disappear
            let liked: Vec<i64> = {
                let mut stmt =
                    conn.prepare("SELECT DISTINCT contentid FROM likes WHERE userid = ?1")?;
                let rows = stmt.query_map(params![userid], |row| row.get(0))?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            conn.execute("BEGIN IMMEDIATE", [])?;
            let result: LibraryResult<()> = (|| {
                conn.execute(
                    "DELETE FROM likes WHERE contentid IN (SELECT oid FROM content WHERE userid = ?1)",
                    params![userid],
                )?;
                conn.execute(
                    "DELETE FROM tags WHERE contentid IN (SELECT oid FROM content WHERE userid = ?1)",
                    params![userid],
                )?;
                conn.execute(
                    "DELETE FROM reports WHERE contentid IN (SELECT oid FROM content WHERE userid = ?1)",
                    params![userid],
                )?;
                conn.execute(
                    "DELETE FROM precomputation WHERE contentid IN (SELECT oid FROM content WHERE userid = ?1)",
                    params![userid],
                )?;
                conn.execute("DELETE FROM content WHERE userid = ?1", params![userid])?;
                conn.execute("DELETE FROM likes WHERE userid = ?1", params![userid])?;
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

            for contentid in liked {
                if guards::content_exists(&conn, contentid)? {
                    precompute::recompute(&conn, contentid)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::testutil;

    #[tokio::test]
    async fn login_creates_then_updates_accounts() {
        let library = testutil::library();

        let first = library.login("ext-1", "Warp", "token-a").await.unwrap();
        let again = library.login("ext-1", "Warped", "token-b").await.unwrap();
        assert_eq!(first, again);

        // Username and token were refreshed
        assert_eq!(library.resolve_token("token-a").await.unwrap(), None);
        assert_eq!(library.resolve_token("token-b").await.unwrap(), Some(first));
        let user = library.get_user("demo", first).await.unwrap();
        assert_eq!(user.username, "Warped");
    }

    #[tokio::test]
    async fn login_steals_duplicate_tokens() {
        let library = testutil::library();
        let first = library.login("ext-1", "Warp", "shared").await.unwrap();
        let second = library.login("ext-2", "Other", "shared").await.unwrap();
        assert_ne!(first, second);

        // The token now belongs to the second account only
        assert_eq!(
            library.resolve_token("shared").await.unwrap(),
            Some(second)
        );
    }

    #[tokio::test]
    async fn empty_tokens_never_resolve() {
        let library = testutil::library();
        library.login("ext-1", "Warp", "token-a").await.unwrap();
        assert_eq!(library.resolve_token("").await.unwrap(), None);
        assert_eq!(library.resolve_token("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn user_aggregates_count_per_project() {
        let library = testutil::library();
        let alice = testutil::user(&library, "a", "alice", false);
        let bob = testutil::user(&library, "b", "bob", false);

        let first = library
            .add_content(Some(alice), "demo", testutil::upload("One", &[1]))
            .await
            .unwrap();
        library
            .add_content(Some(alice), "demo", testutil::upload("Two", &[2]))
            .await
            .unwrap();
        library.add_like(Some(bob), first).await.unwrap();

        let summary = library.get_user("demo", alice).await.unwrap();
        assert_eq!(summary.submission_count, 2);
        assert_eq!(summary.likes_received, 1);
        assert_eq!(summary.likes_given, 0);

        let summary = library.get_user("demo", bob).await.unwrap();
        assert_eq!(summary.submission_count, 0);
        assert_eq!(summary.likes_given, 1);

        // Another project sees zeroes
        let summary = library.get_user("other", alice).await.unwrap();
        assert_eq!(summary.submission_count, 0);
        assert_eq!(summary.likes_received, 0);
    }

    #[tokio::test]
    async fn listing_orders_and_hides_banned() {
        let library = testutil::library();
        let alice = testutil::user(&library, "a", "alice", false);
        let bob = testutil::user(&library, "b", "bob", false);
        let momo = testutil::user(&library, "m", "momo", true);

        library
            .add_content(Some(bob), "demo", testutil::upload("One", &[1]))
            .await
            .unwrap();

        let users = library
            .list_users("demo", 100, 0, UserOrder::Submissions, true)
            .await
            .unwrap();
        assert_eq!(users[0].userid, bob);

        library
            .set_user(Some(momo), bob, Some(true), None, false)
            .await
            .unwrap();
        let users = library
            .list_users("demo", 100, 0, UserOrder::Date, false)
            .await
            .unwrap();
        assert!(users.iter().all(|u| u.userid != bob));
        assert!(users.iter().any(|u| u.userid == alice));

        let err = library.get_user("demo", bob).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound));
    }

    #[tokio::test]
    async fn administration_requires_moderator_and_target() {
        let library = testutil::library();
        let alice = testutil::user(&library, "a", "alice", false);
        let momo = testutil::user(&library, "m", "momo", true);

        let err = library
            .set_user(Some(alice), momo, Some(true), None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::Forbidden));

        let err = library
            .set_user(Some(momo), 999, Some(true), None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotFound));

        library
            .set_user(Some(momo), alice, None, Some(true), false)
            .await
            .unwrap();
        let banned = library.list_banned(Some(alice)).await.unwrap();
        assert!(banned.is_empty());
    }

    #[tokio::test]
    async fn bans_listing_is_moderator_only() {
        let library = testutil::library();
        let alice = testutil::user(&library, "a", "alice", false);
        let bob = testutil::user(&library, "b", "bob", false);
        let momo = testutil::user(&library, "m", "momo", true);

        library
            .set_user(Some(momo), bob, Some(true), None, false)
            .await
            .unwrap();

        let err = library.list_banned(Some(alice)).await.unwrap_err();
        assert!(matches!(err, LibraryError::Forbidden));

        let banned = library.list_banned(Some(momo)).await.unwrap();
        assert_eq!(banned.len(), 1);
        assert_eq!(banned[0].userid, bob);
        assert_eq!(banned[0].username, "bob");
    }

    #[tokio::test]
    async fn purge_removes_contributions_and_refreshes_counts() {
        let library = testutil::library();
        let alice = testutil::user(&library, "a", "alice", false);
        let bob = testutil::user(&library, "b", "bob", false);
        let momo = testutil::user(&library, "m", "momo", true);

        // Bob owns content and likes Alice's
        let alices = library
            .add_content(Some(alice), "demo", testutil::upload("Hers", &[1]))
            .await
            .unwrap();
        let bobs = library
            .add_content(Some(bob), "demo", testutil::upload("His", &[2]))
            .await
            .unwrap();
        library.add_like(Some(bob), alices).await.unwrap();
        library.add_like(Some(alice), bobs).await.unwrap();
        library.add_tag(Some(bob), bobs, "doomed").await.unwrap();

        library
            .set_user(Some(momo), bob, None, None, true)
            .await
            .unwrap();

        // Bob's content and relations are gone
        let err = library.get_content(bobs, false).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound));

        // Alice's like count reflects the purged like immediately
        let conn = library.pool().get().unwrap();
        let likes: i64 = conn
            .query_row(
                "SELECT likes FROM precomputation WHERE contentid = ?1",
                rusqlite::params![alices],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(likes, 0);
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM tags WHERE contentid = ?1",
                rusqlite::params![bobs],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
