//! Durable-store contract: typed loaders plus replace-all writers.
//!
//! Every writer replaces the whole scope (guild table or global table) inside
//! one transaction from the snapshot it is handed. Guild XP tables are small,
//! so delete-then-reinsert beats tracking incremental diffs.

use sqlx::SqlitePool;

pub(crate) mod dao;

pub(crate) async fn load_guild_settings(
    pool: &SqlitePool,
    guild_id: i64,
) -> Result<Option<dao::SettingsRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::SettingsRow>(
        "SELECT guild_id, prefix, level_channel FROM settings WHERE guild_id = ?",
    )
    .bind(guild_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn load_xp(
    pool: &SqlitePool,
    guild_id: i64,
) -> Result<Vec<dao::XpRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::XpRow>("SELECT user_id, xp FROM xp WHERE guild_id = ?")
        .bind(guild_id)
        .fetch_all(pool)
        .await
}

pub(crate) async fn load_mod_stats(
    pool: &SqlitePool,
    guild_id: i64,
) -> Result<Vec<dao::ModStatRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::ModStatRow>(
        "SELECT user_id, action, timestamp FROM mod_stats WHERE guild_id = ?",
    )
    .bind(guild_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn load_deleted_media(
    pool: &SqlitePool,
    guild_id: i64,
) -> Result<Vec<dao::DeletedMediaRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::DeletedMediaRow>(
        "SELECT author, content, media_url, timestamp FROM last_deleted_media \
        WHERE guild_id = ? ORDER BY timestamp DESC LIMIT 10",
    )
    .bind(guild_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn load_afk(pool: &SqlitePool) -> Result<Vec<dao::AfkRow>, sqlx::Error> {
    sqlx::query_as::<_, dao::AfkRow>("SELECT user_id, reason, since FROM afk")
        .fetch_all(pool)
        .await
}

pub(crate) async fn replace_settings(
    pool: &SqlitePool,
    rows: &[dao::SettingsRow],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM settings").execute(&mut *tx).await?;
    for row in rows {
        sqlx::query("INSERT OR REPLACE INTO settings (guild_id, prefix, level_channel) VALUES (?, ?, ?)")
            .bind(row.guild_id)
            .bind(&row.prefix)
            .bind(row.level_channel)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}

pub(crate) async fn replace_xp(
    pool: &SqlitePool,
    guild_id: i64,
    rows: &[(i64, i64)],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM xp WHERE guild_id = ?")
        .bind(guild_id)
        .execute(&mut *tx)
        .await?;
    for (user_id, xp) in rows {
        sqlx::query("INSERT OR REPLACE INTO xp (guild_id, user_id, xp) VALUES (?, ?, ?)")
            .bind(guild_id)
            .bind(user_id)
            .bind(xp)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}

pub(crate) async fn replace_mod_stats(
    pool: &SqlitePool,
    guild_id: i64,
    rows: &[dao::ModStatRow],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM mod_stats WHERE guild_id = ?")
        .bind(guild_id)
        .execute(&mut *tx)
        .await?;
    for row in rows {
        sqlx::query("INSERT INTO mod_stats (guild_id, user_id, action, timestamp) VALUES (?, ?, ?, ?)")
            .bind(guild_id)
            .bind(row.user_id)
            .bind(&row.action)
            .bind(&row.timestamp)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}

pub(crate) async fn replace_deleted_media(
    pool: &SqlitePool,
    guild_id: i64,
    rows: &[dao::DeletedMediaRow],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM last_deleted_media WHERE guild_id = ?")
        .bind(guild_id)
        .execute(&mut *tx)
        .await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO last_deleted_media (guild_id, author, content, media_url, timestamp) \
            VALUES (?, ?, ?, ?, ?)",
        )
        .bind(guild_id)
        .bind(&row.author)
        .bind(&row.content)
        .bind(&row.media_url)
        .bind(&row.timestamp)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

pub(crate) async fn replace_afk(
    pool: &SqlitePool,
    rows: &[dao::AfkRow],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM afk").execute(&mut *tx).await?;
    for row in rows {
        sqlx::query("INSERT OR REPLACE INTO afk (user_id, reason, since) VALUES (?, ?, ?)")
            .bind(row.user_id)
            .bind(&row.reason)
            .bind(&row.since)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}

pub(crate) async fn replace_last_seen(
    pool: &SqlitePool,
    rows: &[(i64, String)],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM last_seen").execute(&mut *tx).await?;
    for (guild_id, timestamp) in rows {
        sqlx::query("INSERT OR REPLACE INTO last_seen (guild_id, timestamp) VALUES (?, ?)")
            .bind(guild_id)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    use sqlx::{sqlite::SqlitePoolOptions, Executor};

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    pool.execute(crate::immut_data::consts::SCHEMA)
        .await
        .expect("failed to initialize schema");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_guild_loads_empty() {
        let pool = memory_pool().await;
        assert!(load_xp(&pool, 1).await.unwrap().is_empty());
        assert!(load_mod_stats(&pool, 1).await.unwrap().is_empty());
        assert!(load_deleted_media(&pool, 1).await.unwrap().is_empty());
        assert!(load_guild_settings(&pool, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_xp_is_last_write_wins() {
        let pool = memory_pool().await;
        replace_xp(&pool, 1, &[(10, 100), (11, 200)]).await.unwrap();
        replace_xp(&pool, 1, &[(10, 150)]).await.unwrap();

        let rows = load_xp(&pool, 1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, 10);
        assert_eq!(rows[0].xp, 150);
    }

    #[tokio::test]
    async fn replace_xp_scopes_by_guild() {
        let pool = memory_pool().await;
        replace_xp(&pool, 1, &[(10, 100)]).await.unwrap();
        replace_xp(&pool, 2, &[(10, 999)]).await.unwrap();

        let rows = load_xp(&pool, 1).await.unwrap();
        assert_eq!(rows[0].xp, 100);
    }

    #[tokio::test]
    async fn settings_round_trip() {
        let pool = memory_pool().await;
        let rows = vec![dao::SettingsRow {
            guild_id: 7,
            prefix: Some("?".to_owned()),
            level_channel: Some(42),
        }];
        replace_settings(&pool, &rows).await.unwrap();

        let loaded = load_guild_settings(&pool, 7).await.unwrap().unwrap();
        assert_eq!(loaded.prefix.as_deref(), Some("?"));
        assert_eq!(loaded.level_channel, Some(42));
    }

    #[tokio::test]
    async fn deleted_media_loads_most_recent_first() {
        let pool = memory_pool().await;
        let rows: Vec<dao::DeletedMediaRow> = (0..3)
            .map(|i| dao::DeletedMediaRow {
                author: format!("user{i}"),
                content: String::new(),
                media_url: format!("https://cdn.example/{i}.png"),
                timestamp: format!("2026-08-0{}T00:00:00+00:00", i + 1),
            })
            .collect();
        replace_deleted_media(&pool, 1, &rows).await.unwrap();

        let loaded = load_deleted_media(&pool, 1).await.unwrap();
        assert_eq!(loaded[0].author, "user2");
        assert_eq!(loaded[2].author, "user0");
    }
}
