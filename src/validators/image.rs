//! Image-shaped content validators.

use std::io::Cursor;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use rusqlite::params;

use crate::db::models::ContentUpload;
use crate::db::DbPool;
use crate::error::LibraryResult;
use crate::guards;
use crate::precompute;
use crate::validators::Validator;

/// Rejects payloads that are not images of the configured format and
/// dimensions. Accepted images are re-encoded from their pixel data, which
/// drops any embedded metadata before the payload is stored.
pub struct ImageValidator {
    width: Option<u32>,
    height: Option<u32>,
    format: ImageFormat,
}

impl ImageValidator {
    pub fn new(width: Option<u32>, height: Option<u32>, format: ImageFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    pub fn png(width: Option<u32>, height: Option<u32>) -> Self {
        Self::new(width, height, ImageFormat::Png)
    }
}

#[async_trait]
impl Validator for ImageValidator {
    async fn pre_upload(
        &self,
        _db: &DbPool,
        _actor: i64,
        draft: &mut ContentUpload,
    ) -> LibraryResult<Option<String>> {
        let format = match image::guess_format(&draft.data) {
            Ok(format) => format,
            Err(_) => return Ok(Some("invalid image".to_string())),
        };
        if format != self.format {
            return Ok(Some("invalid format".to_string()));
        }

        let decoded = match image::load_from_memory(&draft.data) {
            Ok(decoded) => decoded,
            Err(_) => return Ok(Some("invalid image".to_string())),
        };
        if self.width.is_some_and(|w| decoded.width() != w)
            || self.height.is_some_and(|h| decoded.height() != h)
        {
            return Ok(Some("invalid dimensions".to_string()));
        }

        let mut clean = Cursor::new(Vec::new());
        let canvas = DynamicImage::ImageRgba8(decoded.to_rgba8());
        if canvas.write_to(&mut clean, self.format).is_err() {
            return Ok(Some("invalid image".to_string()));
        }
        draft.data = clean.into_inner();

        Ok(None)
    }
}

pub const SKIN_SIZE: u32 = 64;

const CLOTHING_THRESHOLD: u32 = 0;
const HEAD_THRESHOLD: u32 = 6;

/// Character-skin integrity checks against fixed pixel masks.
///
/// Pre-upload the payload must be a 64x64 RGBA image. Post-upload the alpha
/// channel is compared against the clothing and head masks; content that
/// fails the check is tagged `invalid` directly in storage (a write that
/// triggers its own recompute), unless the `hair` tag exempts it.
pub struct SkinValidator {
    clothing_mask: Vec<bool>,
    head_mask: Vec<bool>,
    clothing_threshold: u32,
    head_threshold: u32,
}

impl SkinValidator {
    /// Build from the two 64x64 mask images; a mask pixel is set when its
    /// luma value is non-zero.
    pub fn from_masks(clothing_png: &[u8], head_png: &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            clothing_mask: decode_mask(clothing_png)?,
            head_mask: decode_mask(head_png)?,
            clothing_threshold: CLOTHING_THRESHOLD,
            head_threshold: HEAD_THRESHOLD,
        })
    }
}

fn decode_mask(png: &[u8]) -> anyhow::Result<Vec<bool>> {
    let mask = image::load_from_memory(png)?.to_luma8();
    if mask.width() != SKIN_SIZE || mask.height() != SKIN_SIZE {
        anyhow::bail!("mask must be {SKIN_SIZE}x{SKIN_SIZE}");
    }
    Ok(mask.pixels().map(|p| p.0[0] > 0).collect())
}

#[async_trait]
impl Validator for SkinValidator {
    async fn pre_upload(
        &self,
        _db: &DbPool,
        _actor: i64,
        draft: &mut ContentUpload,
    ) -> LibraryResult<Option<String>> {
        let decoded = match image::load_from_memory(&draft.data) {
            Ok(decoded) => decoded,
            Err(_) => return Ok(Some("not a valid image".to_string())),
        };
        if decoded.width() != SKIN_SIZE || decoded.height() != SKIN_SIZE {
            return Ok(Some(format!("skin must be {SKIN_SIZE}x{SKIN_SIZE}")));
        }
        Ok(None)
    }

    async fn post_upload(
        &self,
        db: &DbPool,
        _actor: i64,
        contentid: i64,
    ) -> LibraryResult<Option<String>> {
        let conn = db.get()?;

        let data: Vec<u8> = match conn.query_row(
            "SELECT data FROM content WHERE oid = ?1",
            params![contentid],
            |row| row.get(0),
        ) {
            Ok(data) => data,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let skin = match image::load_from_memory(&data) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(_) => return Ok(None),
        };

        let size = SKIN_SIZE as usize;
        let mut clothing_alpha = 0u32;
        for y in 0..SKIN_SIZE {
            for x in 0..SKIN_SIZE {
                let masked = self.clothing_mask[y as usize * size + x as usize];
                if masked && skin.get_pixel(x, y).0[3] < 128 {
                    clothing_alpha += 1;
                }
            }
        }

        // Head overlay: the hat layer lives in the right half of the top
        // 32 rows, mirrored over the face region
        let mut head_alpha = 0u32;
        for y in 0..SKIN_SIZE / 2 {
            for x in 0..SKIN_SIZE / 2 {
                let masked = self.head_mask[y as usize * size + x as usize];
                let alpha = u32::from(skin.get_pixel(x, y).0[3])
                    + u32::from(skin.get_pixel(x + SKIN_SIZE / 2, y).0[3]);
                if masked && alpha < 128 {
                    head_alpha += 1;
                }
            }
        }

        let is_hair = guards::has_tag(&conn, contentid, "hair")?;
        let seems_invalid = (clothing_alpha < self.clothing_threshold && !is_hair)
            || head_alpha < self.head_threshold;
        let is_invalid = guards::has_tag(&conn, contentid, "invalid")?;

        if seems_invalid {
            if !is_invalid {
                conn.execute(
                    "INSERT INTO tags (contentid, tag) VALUES (?1, 'invalid')",
                    params![contentid],
                )?;
                precompute::recompute(&conn, contentid)?;
                return Ok(Some(format!("{contentid} has been marked as invalid")));
            }
        } else if is_invalid {
            return Ok(Some(format!(
                "{contentid} seems valid but was marked as invalid"
            )));
        }
        Ok(None)
    }
}
