//! Listing query construction over content joined with its owner and the
//! precomputation cache.
//!
//! Filters are assembled as a list of typed clauses with bound parameters,
//! so the shape of a query can be tested without a live database. The cache
//! row is the read-side source for likes/tags/report counts; callers are
//! responsible for having recomputed it after their own mutations.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::Deserialize;

use crate::db::models::{split_tags, ContentSummary, Meta, DEFAULT_REASON};
use crate::error::{LibraryError, LibraryResult};

/// Which slice of a project's content to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    All,
    Likes,
    Submissions,
}

impl FromStr for Track {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Track::All),
            "likes" => Ok(Track::Likes),
            "submissions" => Ok(Track::Submissions),
            other => Err(LibraryError::InvalidArgument(format!(
                "Invalid track '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Date,
    Likes,
    Title,
    Reports,
    Recommendations,
}

impl FromStr for Order {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(Order::Date),
            "likes" => Ok(Order::Likes),
            "title" => Ok(Order::Title),
            "reports" => Ok(Order::Reports),
            "recommendations" => Ok(Order::Recommendations),
            other => Err(LibraryError::InvalidArgument(format!(
                "Invalid order '{other}'"
            ))),
        }
    }
}

pub const MAX_LIMIT: u32 = 500;

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub track: Track,
    /// Explicit target user for LIKES/SUBMISSIONS; the caller's own id when
    /// omitted.
    pub userid: Option<i64>,
    /// Comma separated terms; every term must match username, title or a tag.
    pub whitelist: Option<String>,
    /// Comma separated terms; any term matching a tag excludes the content.
    pub blacklist: Option<String>,
    pub filter_banned: bool,
    pub filter_reported: bool,
    pub offset: u32,
    pub limit: u32,
    pub order: Order,
    pub descending: bool,
    pub include_meta: bool,
    pub parse_meta: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            track: Track::All,
            userid: None,
            whitelist: None,
            blacklist: None,
            filter_banned: true,
            filter_reported: true,
            offset: 0,
            limit: 100,
            order: Order::Date,
            descending: false,
            include_meta: false,
            parse_meta: false,
        }
    }
}

/// One typed filter clause with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Clause {
    Project(String),
    LikedBy(i64),
    OwnedBy(i64),
    /// Self-hide content the viewer reported with the default reason.
    NotReportedBy(i64),
    ExcludeBanned,
    VisibilityScore,
    WhitelistTerm(String),
    BlacklistTerm(String),
}

impl Clause {
    fn sql(&self) -> &'static str {
        match self {
            Clause::Project(_) => "c.project = ?",
            Clause::LikedBy(_) => "likes.userid = ?",
            Clause::OwnedBy(_) => "c.userid = ?",
            Clause::NotReportedBy(_) => {
                "NOT EXISTS (SELECT 1
                        FROM reports
                        WHERE reports.contentid = c.oid AND reports.reason = ? AND reports.userid = ?)"
            }
            Clause::ExcludeBanned => "NOT users.banned",
            Clause::VisibilityScore => {
                "1.0 + precomputation.likes / 10.0 - precomputation.reports + precomputation.counter_reports * 10.0 >= 0.0"
            }
            Clause::WhitelistTerm(_) => {
                "(users.username LIKE ? OR c.title LIKE ? OR precomputation.tags LIKE ?)"
            }
            Clause::BlacklistTerm(_) => "NOT precomputation.tags LIKE ?",
        }
    }

    fn push_params(&self, out: &mut Vec<Value>) {
        match self {
            Clause::Project(p) => out.push(Value::Text(p.clone())),
            Clause::LikedBy(id) | Clause::OwnedBy(id) => out.push(Value::Integer(*id)),
            Clause::NotReportedBy(id) => {
                out.push(Value::Text(DEFAULT_REASON.to_string()));
                out.push(Value::Integer(*id));
            }
            Clause::ExcludeBanned | Clause::VisibilityScore => {}
            Clause::WhitelistTerm(term) => {
                let pattern = format!("%{term}%");
                out.push(Value::Text(pattern.clone()));
                out.push(Value::Text(pattern.clone()));
                out.push(Value::Text(pattern));
            }
            Clause::BlacklistTerm(term) => out.push(Value::Text(format!("%{term}%"))),
        }
    }
}

/// Split a comma separated term list, dropping blank entries.
fn terms(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Seed for the recommendation order: stable within a calendar day for a
/// given user, different across users and days.
pub fn recommendation_seed(userid: Option<i64>, now: DateTime<Utc>) -> i64 {
    userid.unwrap_or(0) + now.timestamp() / 86_400
}

/// The documented LCG transform, mirrored in Rust for verification.
pub fn recommendation_score(seed: i64, oid: i64, likes: i64) -> f64 {
    let hash = ((seed + oid).wrapping_mul(1_103_515_245).wrapping_add(12_345))
        .rem_euclid(2_147_483_648);
    hash as f64 / 2_147_483_648.0 * (likes + 100) as f64
}

const RECOMMENDATION_SQL: &str =
    "(((? + c.oid) * 1103515245 + 12345) % 2147483648) / 2147483648.0 * (precomputation.likes + 100)";

fn base_select(include_meta: bool, include_data: bool) -> String {
    let mut columns = String::from(
        "c.oid, c.userid, users.username, c.title, c.version, precomputation.likes, precomputation.tags",
    );
    if include_meta || include_data {
        columns.push_str(", c.meta");
    }
    if include_data {
        columns.push_str(", c.data");
    }

    format!(
        "SELECT {columns}
        FROM content c
                 INNER JOIN users ON c.userid = users.oid
                 INNER JOIN precomputation ON c.oid = precomputation.contentid"
    )
}

/// Full-projection select for a single content item.
pub(crate) fn detail_select() -> String {
    format!("{} \n WHERE c.oid = ?", base_select(true, true))
}

#[derive(Debug)]
pub(crate) struct ListQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Assemble the listing query. `viewer` is the authenticated caller (if any),
/// used for the personal-report filter and as the default track target.
pub(crate) fn build_list_query(
    project: &str,
    opts: &ListOptions,
    viewer: Option<i64>,
    seed: i64,
) -> LibraryResult<ListQuery> {
    let target = opts.userid.or(viewer);
    let mut clauses = vec![Clause::Project(project.to_string())];
    let mut join_likes = false;

    match opts.track {
        Track::All => {}
        Track::Likes => {
            let id = target.ok_or_else(|| {
                LibraryError::InvalidArgument("Track 'likes' requires a user".into())
            })?;
            join_likes = true;
            clauses.push(Clause::LikedBy(id));
        }
        Track::Submissions => {
            let id = target.ok_or_else(|| {
                LibraryError::InvalidArgument("Track 'submissions' requires a user".into())
            })?;
            clauses.push(Clause::OwnedBy(id));
        }
    }

    // Hide content the caller reported, independent of moderation status
    if viewer.is_some() {
        if let Some(id) = target {
            clauses.push(Clause::NotReportedBy(id));
        }
    }

    if opts.filter_banned {
        clauses.push(Clause::ExcludeBanned);
    }
    if opts.filter_reported {
        clauses.push(Clause::VisibilityScore);
    }

    if let Some(list) = &opts.whitelist {
        for term in terms(list) {
            clauses.push(Clause::WhitelistTerm(term));
        }
    }
    if let Some(list) = &opts.blacklist {
        for term in terms(list) {
            clauses.push(Clause::BlacklistTerm(term));
        }
    }

    let mut sql = base_select(opts.include_meta, false);
    if join_likes {
        sql.push_str("\n                 INNER JOIN likes ON likes.contentid = c.oid");
    }

    let mut params: Vec<Value> = Vec::new();
    for (index, clause) in clauses.iter().enumerate() {
        sql.push_str(if index == 0 { "\n WHERE " } else { "\n   AND " });
        sql.push_str(clause.sql());
        clause.push_params(&mut params);
    }

    let order_key = match opts.order {
        Order::Date => "c.oid",
        Order::Likes => "precomputation.likes",
        Order::Title => "c.title",
        Order::Reports => "precomputation.reports",
        Order::Recommendations => RECOMMENDATION_SQL,
    };
    sql.push_str(&format!(
        "\n ORDER BY {order_key} {}",
        if opts.descending { "DESC" } else { "ASC" }
    ));
    if opts.order == Order::Recommendations {
        params.push(Value::Integer(seed));
    }

    sql.push_str("\n LIMIT ? OFFSET ?");
    params.push(Value::Integer(i64::from(opts.limit.clamp(1, MAX_LIMIT))));
    params.push(Value::Integer(i64::from(opts.offset)));

    Ok(ListQuery { sql, params })
}

/// Map a lite-projection row. Column order matches `base_select`.
pub(crate) fn summary_from_row(
    row: &Row<'_>,
    include_meta: bool,
    parse_meta: bool,
) -> rusqlite::Result<ContentSummary> {
    let tags: String = row.get(6)?;
    let meta = if include_meta {
        let raw: String = row.get(7)?;
        Some(if parse_meta {
            Meta::parsed(&raw)
        } else {
            Meta::Raw(raw)
        })
    } else {
        None
    };

    Ok(ContentSummary {
        contentid: row.get(0)?,
        userid: row.get(1)?,
        username: row.get(2)?,
        title: row.get(3)?,
        version: row.get(4)?,
        likes: row.get(5)?,
        tags: split_tags(&tags),
        meta,
    })
}
