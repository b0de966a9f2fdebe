use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::db::connection::Database;
use crate::models::NewPhoto;

/// Stored verification photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    pub id: String,
    pub user_id: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Database {
    /// Returns the id the clock event refers to.
    pub async fn insert_photo(&self, photo: NewPhoto) -> Result<String> {
        self.execute(move |conn| {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO photos (id, user_id, content_type, width, height, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    photo.user_id,
                    photo.content_type,
                    photo.width,
                    photo.height,
                    photo.data,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert photo")?;
            Ok(id)
        })
        .await
    }

    pub async fn get_photo(&self, id: &str) -> Result<Option<StoredPhoto>> {
        let id = id.to_string();
        self.execute(move |conn| {
            let photo = conn
                .query_row(
                    "SELECT id, user_id, content_type, width, height, data FROM photos WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(StoredPhoto {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            content_type: row.get(2)?,
                            width: row.get(3)?,
                            height: row.get(4)?,
                            data: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(photo)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn photo_bytes_survive_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("geoclock.db")).expect("open db");

        let data = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
        let id = db
            .insert_photo(NewPhoto {
                user_id: "emp-7".into(),
                content_type: "image/jpeg",
                width: 640,
                height: 480,
                data: data.clone(),
            })
            .await
            .expect("insert");

        let stored = db.get_photo(&id).await.expect("query").expect("present");
        assert_eq!(stored.data, data);
        assert_eq!((stored.width, stored.height), (640, 480));
        assert_eq!(stored.content_type, "image/jpeg");

        assert!(db.get_photo("missing").await.expect("query").is_none());
    }
}
