//! Pinned media store
//!
//! Read/write permanent media snapshots in the `media_store` table
//! (key-value store). Each pin is written twice: under its source id and
//! under the singleton "last selected" key. Values are JSON descriptors.

use crate::error::Result;
use lessonplay_common::media::MediaDescriptor;
use sqlx::{Pool, Sqlite};
use tracing::warn;

const SOURCE_KEY_PREFIX: &str = "permanent_media:source:";

/// Singleton key holding the most recent pin
pub const LAST_SELECTED_KEY: &str = "permanent_media:last_selected";

/// Store key of the pin for `source_id`
pub fn source_key(source_id: &str) -> String {
    format!("{}{}", SOURCE_KEY_PREFIX, source_id)
}

/// Persist a permanent descriptor under its source key and the last-selected key
pub async fn save_permanent_media(db: &Pool<Sqlite>, descriptor: &MediaDescriptor) -> Result<()> {
    let mut snapshot = descriptor.clone();
    snapshot.is_permanent = true;
    let value = serde_json::to_string(&snapshot)?;

    let mut tx = db.begin().await?;
    for key in [source_key(&snapshot.source_id), LAST_SELECTED_KEY.to_string()] {
        sqlx::query(
            r#"
            INSERT INTO media_store (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&value)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Load the pin stored for `source_id`
pub async fn load_permanent_media(
    db: &Pool<Sqlite>,
    source_id: &str,
) -> Result<Option<MediaDescriptor>> {
    load_descriptor(db, &source_key(source_id)).await
}

/// Load the most recent pin
pub async fn load_last_selected(db: &Pool<Sqlite>) -> Result<Option<MediaDescriptor>> {
    load_descriptor(db, LAST_SELECTED_KEY).await
}

/// Remove the pin for `source_id`
///
/// The last-selected key is cleared too when it points at the same source.
pub async fn clear_permanent_media(db: &Pool<Sqlite>, source_id: &str) -> Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM media_store WHERE key = ?")
        .bind(source_key(source_id))
        .execute(&mut *tx)
        .await?;

    let last: Option<String> = sqlx::query_scalar("SELECT value FROM media_store WHERE key = ?")
        .bind(LAST_SELECTED_KEY)
        .fetch_optional(&mut *tx)
        .await?;
    let points_here = last
        .and_then(|value| serde_json::from_str::<MediaDescriptor>(&value).ok())
        .is_some_and(|d| d.source_id == source_id);
    if points_here {
        sqlx::query("DELETE FROM media_store WHERE key = ?")
            .bind(LAST_SELECTED_KEY)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Read and parse one key; corrupt JSON is logged and treated as absent
async fn load_descriptor(db: &Pool<Sqlite>, key: &str) -> Result<Option<MediaDescriptor>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM media_store WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    Ok(value.and_then(|value| match serde_json::from_str::<MediaDescriptor>(&value) {
        Ok(descriptor) => Some(descriptor),
        Err(e) => {
            warn!(key, error = %e, "Ignoring corrupt media store entry");
            None
        }
    }))
}
