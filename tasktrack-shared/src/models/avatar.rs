/// Avatar blobs
///
/// One image per account, stored whole. Uploading replaces the previous image:
/// the old row is deleted and the new one inserted in the same transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE avatars (
///     owner_id UUID PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
///     content_type TEXT NOT NULL,
///     data BYTEA NOT NULL,
///     size_bytes BIGINT NOT NULL,
///     checksum TEXT NOT NULL,
///     uploaded_at BIGINT NOT NULL
/// );
/// ```

use bytes::Bytes;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

/// Image formats accepted for avatars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarFormat {
    Png,
    Jpeg,
}

impl AvatarFormat {
    /// Picks the format from a file name's extension (`.png`, `.jpg`, `.jpeg`)
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// MIME type served for this format
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// A stored avatar image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    pub owner_id: Uuid,

    pub content_type: String,

    pub data: Bytes,

    /// Hex SHA-256 of `data`, served as the ETag
    pub checksum: String,

    /// Upload time (Unix seconds)
    pub uploaded_at: i64,
}

impl Avatar {
    /// Builds an avatar record, computing its checksum
    pub fn new(owner_id: Uuid, data: Bytes, content_type: &str, uploaded_at: i64) -> Self {
        let checksum = hex::encode(Sha256::digest(&data));

        Self {
            owner_id,
            content_type: content_type.to_string(),
            data,
            checksum,
            uploaded_at,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

#[derive(sqlx::FromRow)]
struct AvatarRow {
    owner_id: Uuid,
    content_type: String,
    data: Vec<u8>,
    checksum: String,
    uploaded_at: i64,
}

impl From<AvatarRow> for Avatar {
    fn from(row: AvatarRow) -> Self {
        Self {
            owner_id: row.owner_id,
            content_type: row.content_type,
            data: Bytes::from(row.data),
            checksum: row.checksum,
            uploaded_at: row.uploaded_at,
        }
    }
}

impl Avatar {
    /// Stores `avatar`, deleting any previous image for the same owner first
    pub async fn replace(pool: &PgPool, avatar: &Avatar) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM avatars WHERE owner_id = $1")
            .bind(avatar.owner_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() > 0 {
            tracing::debug!(owner_id = %avatar.owner_id, "Replaced existing avatar");
        }

        sqlx::query(
            r#"
            INSERT INTO avatars (owner_id, content_type, data, size_bytes, checksum, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(avatar.owner_id)
        .bind(&avatar.content_type)
        .bind(avatar.data.as_ref())
        .bind(avatar.size_bytes() as i64)
        .bind(&avatar.checksum)
        .bind(avatar.uploaded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// Loads the avatar for `owner_id`
    pub async fn find(pool: &PgPool, owner_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, AvatarRow>(
            r#"
            SELECT owner_id, content_type, data, checksum, uploaded_at
            FROM avatars
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Deletes the avatar for `owner_id`
    ///
    /// # Returns
    ///
    /// True if there was one
    pub async fn delete(pool: &PgPool, owner_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM avatars WHERE owner_id = $1")
            .bind(owner_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(AvatarFormat::from_file_name("me.png"), Some(AvatarFormat::Png));
        assert_eq!(AvatarFormat::from_file_name("ME.JPG"), Some(AvatarFormat::Jpeg));
        assert_eq!(AvatarFormat::from_file_name("a.b.jpeg"), Some(AvatarFormat::Jpeg));
        assert_eq!(AvatarFormat::from_file_name("me.gif"), None);
        assert_eq!(AvatarFormat::from_file_name("noext"), None);
        assert_eq!(AvatarFormat::from_file_name("png"), None);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(AvatarFormat::Png.content_type(), "image/png");
        assert_eq!(AvatarFormat::Jpeg.content_type(), "image/jpeg");
    }

    #[test]
    fn test_checksum() {
        let avatar = Avatar::new(Uuid::new_v4(), Bytes::from_static(b"abc"), "image/png", 0);

        assert_eq!(
            avatar.checksum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(avatar.size_bytes(), 3);
    }
}
