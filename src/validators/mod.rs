//! Per-project extension pipeline.
//!
//! A project resolves to an ordered list of validators. Pre-mutation hooks
//! run fail-fast: the first handler returning a message vetoes the operation
//! before any row is written. Post-mutation hooks run best-effort after the
//! mutation is committed: their messages are collected in order and a
//! failing handler is logged and skipped, never surfaced.

pub mod common;
pub mod image;
pub mod report;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::db::models::ContentUpload;
use crate::db::DbPool;
use crate::error::{LibraryError, LibraryResult};

pub use common::{JsonMetaValidator, MaxSizeValidator, ReadOnlyValidator, TitleLengthValidator};
pub use image::{ImageValidator, SkinValidator};
pub use report::ReportThresholdValidator;

/// Lifecycle hooks. Every hook defaults to a no-op; a `Some` return is a
/// rejection message for `pre_*` hooks and a log message for `post_*` hooks.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn pre_upload(
        &self,
        db: &DbPool,
        actor: i64,
        draft: &mut ContentUpload,
    ) -> LibraryResult<Option<String>> {
        let _ = (db, actor, draft);
        Ok(None)
    }

    async fn post_upload(
        &self,
        db: &DbPool,
        actor: i64,
        contentid: i64,
    ) -> LibraryResult<Option<String>> {
        let _ = (db, actor, contentid);
        Ok(None)
    }

    async fn pre_report(
        &self,
        db: &DbPool,
        actor: i64,
        contentid: i64,
        reason: &str,
    ) -> LibraryResult<Option<String>> {
        let _ = (db, actor, contentid, reason);
        Ok(None)
    }

    async fn post_report(
        &self,
        db: &DbPool,
        actor: i64,
        contentid: i64,
        reason: &str,
    ) -> LibraryResult<Option<String>> {
        let _ = (db, actor, contentid, reason);
        Ok(None)
    }
}

/// An ordered validator bundle for one project namespace.
#[derive(Default)]
pub struct Project {
    validators: Vec<Box<dyn Validator>>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn push(&mut self, validator: impl Validator + 'static) {
        self.validators.push(Box::new(validator));
    }

    /// Fail-fast upload validation: handlers run in order, the first message
    /// aborts with `ValidationRejected` carrying it verbatim.
    pub async fn validate_upload(
        &self,
        db: &DbPool,
        actor: i64,
        draft: &mut ContentUpload,
    ) -> LibraryResult<()> {
        for validator in &self.validators {
            if let Some(message) = validator.pre_upload(db, actor, draft).await? {
                return Err(LibraryError::ValidationRejected(message));
            }
        }
        Ok(())
    }

    /// Fail-fast report validation.
    pub async fn validate_report(
        &self,
        db: &DbPool,
        actor: i64,
        contentid: i64,
        reason: &str,
    ) -> LibraryResult<()> {
        for validator in &self.validators {
            if let Some(message) = validator.pre_report(db, actor, contentid, reason).await? {
                return Err(LibraryError::ValidationRejected(message));
            }
        }
        Ok(())
    }

    /// Best-effort post-upload notification: every handler runs, messages are
    /// collected in handler order, failures are logged and skipped since the
    /// mutation is already committed.
    pub async fn notify_upload(&self, db: &DbPool, actor: i64, contentid: i64) -> Vec<String> {
        let mut log = Vec::new();
        for validator in &self.validators {
            match validator.post_upload(db, actor, contentid).await {
                Ok(Some(message)) => log.push(message),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(contentid, error = %err, "post_upload handler failed");
                }
            }
        }
        log
    }

    /// Best-effort post-report notification.
    pub async fn notify_report(
        &self,
        db: &DbPool,
        actor: i64,
        contentid: i64,
        reason: &str,
    ) -> Vec<String> {
        let mut log = Vec::new();
        for validator in &self.validators {
            match validator.post_report(db, actor, contentid, reason).await {
                Ok(Some(message)) => log.push(message),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(contentid, error = %err, "post_report handler failed");
                }
            }
        }
        log
    }
}

/// Resolves project names to their validator bundles. Unconfigured names fall
/// back to a read-only default, so nothing can be uploaded to a project that
/// was never declared.
pub struct ProjectRegistry {
    projects: HashMap<String, Project>,
    fallback: Project,
}

impl Default for ProjectRegistry {
    fn default() -> Self {
        Self {
            projects: HashMap::new(),
            fallback: Project::new().with(ReadOnlyValidator),
        }
    }
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the fallback used for unconfigured project names.
    pub fn with_fallback(mut self, fallback: Project) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, project: Project) {
        self.projects.insert(name.into(), project);
    }

    pub fn with_project(mut self, name: impl Into<String>, project: Project) -> Self {
        self.insert(name, project);
        self
    }

    pub fn resolve(&self, name: &str) -> &Project {
        self.projects.get(name).unwrap_or(&self.fallback)
    }
}
