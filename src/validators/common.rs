//! Project-agnostic validators.

use async_trait::async_trait;

use crate::db::models::ContentUpload;
use crate::db::DbPool;
use crate::error::LibraryResult;
use crate::guards;
use crate::validators::Validator;

/// Rejects uploads unless the actor is a moderator. Installed on the default
/// fallback project so unconfigured namespaces stay read-only.
pub struct ReadOnlyValidator;

#[async_trait]
impl Validator for ReadOnlyValidator {
    async fn pre_upload(
        &self,
        db: &DbPool,
        actor: i64,
        _draft: &mut ContentUpload,
    ) -> LibraryResult<Option<String>> {
        let conn = db.get()?;
        if guards::is_moderator(&conn, actor)? {
            return Ok(None);
        }
        Ok(Some("Project is read only".to_string()))
    }
}

pub struct TitleLengthValidator {
    min_size: usize,
    max_size: usize,
}

impl TitleLengthValidator {
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self { min_size, max_size }
    }
}

impl Default for TitleLengthValidator {
    fn default() -> Self {
        Self::new(1, 1024)
    }
}

#[async_trait]
impl Validator for TitleLengthValidator {
    async fn pre_upload(
        &self,
        _db: &DbPool,
        _actor: i64,
        draft: &mut ContentUpload,
    ) -> LibraryResult<Option<String>> {
        if draft.title.chars().count() < self.min_size {
            return Ok(Some("title too short".to_string()));
        }
        if draft.title.chars().count() > self.max_size {
            return Ok(Some("title too long".to_string()));
        }
        Ok(None)
    }
}

/// Caps the payload size in bytes.
pub struct MaxSizeValidator {
    max_size: usize,
}

impl MaxSizeValidator {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

#[async_trait]
impl Validator for MaxSizeValidator {
    async fn pre_upload(
        &self,
        _db: &DbPool,
        _actor: i64,
        draft: &mut ContentUpload,
    ) -> LibraryResult<Option<String>> {
        if draft.data.len() > self.max_size {
            return Ok(Some("data too large".to_string()));
        }
        Ok(None)
    }
}

/// Requires the meta field to parse as a JSON object, optionally carrying a
/// set of required keys.
#[derive(Default)]
pub struct JsonMetaValidator {
    required: Vec<String>,
}

impl JsonMetaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_required(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required: keys.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Validator for JsonMetaValidator {
    async fn pre_upload(
        &self,
        _db: &DbPool,
        _actor: i64,
        draft: &mut ContentUpload,
    ) -> LibraryResult<Option<String>> {
        let value: serde_json::Value = match serde_json::from_str(&draft.meta) {
            Ok(value) => value,
            Err(err) => return Ok(Some(format!("meta is not valid JSON: {err}"))),
        };
        let Some(object) = value.as_object() else {
            return Ok(Some("meta is not a JSON object".to_string()));
        };
        for key in &self.required {
            if !object.contains_key(key) {
                return Ok(Some(format!("meta is missing required field '{key}'")));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn draft(title: &str, meta: &str, data: Vec<u8>) -> ContentUpload {
        ContentUpload {
            title: title.into(),
            meta: meta.into(),
            data,
            tags: None,
        }
    }

    #[tokio::test]
    async fn read_only_lets_moderators_through() {
        let pool = db::memory_pool();
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO users (external_id, token, username, moderator)
                 VALUES ('a', 't1', 'alice', 1), ('b', 't2', 'bob', 0)",
                [],
            )
            .unwrap();
        }
        let validator = ReadOnlyValidator;
        let mut upload = draft("Test", "{}", vec![0]);

        assert!(validator
            .pre_upload(&pool, 1, &mut upload)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            validator.pre_upload(&pool, 2, &mut upload).await.unwrap(),
            Some("Project is read only".to_string())
        );
    }

    #[tokio::test]
    async fn title_length_bounds() {
        let pool = db::memory_pool();
        let validator = TitleLengthValidator::default();

        let mut empty = draft("", "{}", vec![0]);
        assert_eq!(
            validator.pre_upload(&pool, 1, &mut empty).await.unwrap(),
            Some("title too short".to_string())
        );

        let mut long = draft(&"x".repeat(1025), "{}", vec![0]);
        assert_eq!(
            validator.pre_upload(&pool, 1, &mut long).await.unwrap(),
            Some("title too long".to_string())
        );

        let mut ok = draft("Fine", "{}", vec![0]);
        assert!(validator
            .pre_upload(&pool, 1, &mut ok)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn max_size_caps_payload_bytes() {
        let pool = db::memory_pool();
        let validator = MaxSizeValidator::new(4);

        let mut small = draft("Test", "{}", vec![0; 4]);
        assert!(validator
            .pre_upload(&pool, 1, &mut small)
            .await
            .unwrap()
            .is_none());

        let mut big = draft("Test", "{}", vec![0; 5]);
        assert_eq!(
            validator.pre_upload(&pool, 1, &mut big).await.unwrap(),
            Some("data too large".to_string())
        );
    }

    #[tokio::test]
    async fn json_meta_requires_object_and_keys() {
        let pool = db::memory_pool();
        let validator = JsonMetaValidator::with_required(["gender", "profession"]);

        let mut invalid = draft("Test", "not json", vec![0]);
        assert!(validator
            .pre_upload(&pool, 1, &mut invalid)
            .await
            .unwrap()
            .is_some());

        let mut array = draft("Test", "[1,2]", vec![0]);
        assert_eq!(
            validator.pre_upload(&pool, 1, &mut array).await.unwrap(),
            Some("meta is not a JSON object".to_string())
        );

        let mut missing = draft("Test", r#"{"gender": 1}"#, vec![0]);
        assert_eq!(
            validator.pre_upload(&pool, 1, &mut missing).await.unwrap(),
            Some("meta is missing required field 'profession'".to_string())
        );

        let mut ok = draft("Test", r#"{"gender": 1, "profession": "smith"}"#, vec![0]);
        assert!(validator
            .pre_upload(&pool, 1, &mut ok)
            .await
            .unwrap()
            .is_none());
    }
}
