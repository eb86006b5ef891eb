//! # PostgreSQL Entity Store
//!
//! Production [`EntityStore`] over a `sqlx` connection pool. Every entity
//! write is a single `INSERT ... ON CONFLICT` statement, so concurrent
//! deliveries of the same event are resolved row by row by the database.

use crate::{
    entities::{
        ChannelRecord, ChatRecord, ContactRecord, ContactTagRecord, MessageRecord,
        OrganizationMemberRecord, OrganizationRecord, SectorRecord, TagRecord, WebhookLogRecord,
    },
    store::{EntityStore, StoreError},
    EventId, Timestamp,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;

/// Connection settings for [`PostgresEntityStore::connect`]
#[derive(Debug, Clone)]
pub struct PostgresStoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// PostgreSQL [`EntityStore`]
#[derive(Clone)]
pub struct PostgresEntityStore {
    pool: PgPool,
}

impl PostgresEntityStore {
    #[tracing::instrument(level = "debug", skip(config))]
    pub async fn connect(config: &PostgresStoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| store_error("connect postgres", e))?;

        info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::OperationFailed {
                message: format!("apply migrations: {}", e),
            })
    }

    fn log_from_row(row: &PgRow) -> Result<WebhookLogRecord, StoreError> {
        let event_id: String = row
            .try_get("event_id")
            .map_err(|e| store_error("event_id", e))?;
        let event_id = EventId::new(event_id).map_err(|e| StoreError::OperationFailed {
            message: format!("invalid event_id in webhook_logs: {}", e),
        })?;

        Ok(WebhookLogRecord {
            event_id,
            event_type: row
                .try_get("event_type")
                .map_err(|e| store_error("event_type", e))?,
            event_date: row
                .try_get::<DateTime<Utc>, _>("event_date")
                .map(Timestamp::from)
                .map_err(|e| store_error("event_date", e))?,
            raw_payload: row
                .try_get("raw_payload")
                .map_err(|e| store_error("raw_payload", e))?,
            processed: row
                .try_get("processed")
                .map_err(|e| store_error("processed", e))?,
            error_message: row
                .try_get("error_message")
                .map_err(|e| store_error("error_message", e))?,
            received_at: row
                .try_get::<DateTime<Utc>, _>("received_at")
                .map(Timestamp::from)
                .map_err(|e| store_error("received_at", e))?,
        })
    }
}

fn at(ts: &Timestamp) -> DateTime<Utc> {
    *ts.as_datetime()
}

fn at_opt(ts: &Option<Timestamp>) -> Option<DateTime<Utc>> {
    ts.as_ref().map(at)
}

/// Classify a sqlx error
fn store_error(context: &str, error: sqlx::Error) -> StoreError {
    let message = format!("{}: {}", context, error);
    match &error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable { message }
        }
        sqlx::Error::Database(db)
            if db.is_foreign_key_violation() || db.is_unique_violation() || db.is_check_violation() =>
        {
            StoreError::ConstraintViolation { message }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound {
            key: context.to_string(),
        },
        _ => StoreError::OperationFailed { message },
    }
}

#[async_trait]
impl EntityStore for PostgresEntityStore {
    #[tracing::instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    async fn upsert_organization(&self, record: &OrganizationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(at(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("upsert organization", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    async fn upsert_channel(&self, record: &ChannelRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO channels (id, organization_id, channel_type, phone_number, name, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                organization_id = EXCLUDED.organization_id,
                channel_type = EXCLUDED.channel_type,
                phone_number = EXCLUDED.phone_number,
                name = EXCLUDED.name,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.organization_id)
        .bind(&record.channel_type)
        .bind(&record.phone_number)
        .bind(&record.name)
        .bind(at(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("upsert channel", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    async fn upsert_sector(&self, record: &SectorRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sectors (id, organization_id, name, is_default, order_index, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                organization_id = EXCLUDED.organization_id,
                name = EXCLUDED.name,
                is_default = EXCLUDED.is_default,
                order_index = EXCLUDED.order_index,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.organization_id)
        .bind(&record.name)
        .bind(record.is_default)
        .bind(record.order_index)
        .bind(at(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("upsert sector", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    async fn upsert_member(&self, record: &OrganizationMemberRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO organization_members (id, organization_id, is_muted, total_unread, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                organization_id = EXCLUDED.organization_id,
                is_muted = EXCLUDED.is_muted,
                total_unread = EXCLUDED.total_unread,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.organization_id)
        .bind(record.is_muted)
        .bind(record.total_unread)
        .bind(at(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("upsert organization member", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    async fn upsert_contact(&self, record: &ContactRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO contacts (
                id, organization_id, name, phone_number, profile_picture_url,
                is_blocked, last_active_utc, contact_type, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                organization_id = EXCLUDED.organization_id,
                name = EXCLUDED.name,
                phone_number = EXCLUDED.phone_number,
                profile_picture_url = EXCLUDED.profile_picture_url,
                is_blocked = EXCLUDED.is_blocked,
                last_active_utc = EXCLUDED.last_active_utc,
                contact_type = EXCLUDED.contact_type,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.organization_id)
        .bind(&record.name)
        .bind(&record.phone_number)
        .bind(&record.profile_picture_url)
        .bind(record.is_blocked)
        .bind(at_opt(&record.last_active_at))
        .bind(&record.contact_type)
        .bind(at(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("upsert contact", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    async fn upsert_tag(&self, record: &TagRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tags (id, name, color, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                color = EXCLUDED.color,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.color)
        .bind(at(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("upsert tag", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(key = %record.key()))]
    async fn upsert_contact_tag(&self, record: &ContactTagRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO contact_tags (contact_id, tag_id)
            VALUES ($1, $2)
            ON CONFLICT (contact_id, tag_id) DO NOTHING
            "#,
        )
        .bind(&record.contact_id)
        .bind(&record.tag_id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("upsert contact tag", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    async fn upsert_chat(&self, record: &ChatRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chats (
                id, organization_id, contact_id, channel_id, sector_id, assigned_member_id,
                is_open, is_private, is_waiting, waiting_since_utc, total_unread,
                first_contact_message_id, first_member_reply_id,
                first_contact_message_at, first_member_reply_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE SET
                organization_id = EXCLUDED.organization_id,
                contact_id = EXCLUDED.contact_id,
                channel_id = EXCLUDED.channel_id,
                sector_id = EXCLUDED.sector_id,
                assigned_member_id = EXCLUDED.assigned_member_id,
                is_open = EXCLUDED.is_open,
                is_private = EXCLUDED.is_private,
                is_waiting = EXCLUDED.is_waiting,
                waiting_since_utc = EXCLUDED.waiting_since_utc,
                total_unread = EXCLUDED.total_unread,
                first_contact_message_id = EXCLUDED.first_contact_message_id,
                first_member_reply_id = EXCLUDED.first_member_reply_id,
                first_contact_message_at = EXCLUDED.first_contact_message_at,
                first_member_reply_at = EXCLUDED.first_member_reply_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.organization_id)
        .bind(&record.contact_id)
        .bind(&record.channel_id)
        .bind(&record.sector_id)
        .bind(&record.assigned_member_id)
        .bind(record.is_open)
        .bind(record.is_private)
        .bind(record.is_waiting)
        .bind(at_opt(&record.waiting_since))
        .bind(record.total_unread)
        .bind(&record.first_contact_message_id)
        .bind(&record.first_member_reply_id)
        .bind(at_opt(&record.first_contact_message_at))
        .bind(at_opt(&record.first_member_reply_at))
        .bind(at(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("upsert chat", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    async fn upsert_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO messages (
                id, chat_id, contact_id, organization_member_id, content, message_type,
                source, message_state, is_private, event_at_utc, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                chat_id = EXCLUDED.chat_id,
                contact_id = EXCLUDED.contact_id,
                organization_member_id = EXCLUDED.organization_member_id,
                content = EXCLUDED.content,
                message_type = EXCLUDED.message_type,
                source = EXCLUDED.source,
                message_state = EXCLUDED.message_state,
                is_private = EXCLUDED.is_private,
                event_at_utc = EXCLUDED.event_at_utc,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.chat_id)
        .bind(&record.contact_id)
        .bind(&record.organization_member_id)
        .bind(&record.content)
        .bind(&record.message_type)
        .bind(&record.source)
        .bind(&record.message_state)
        .bind(record.is_private)
        .bind(at(&record.event_at))
        .bind(at(&record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("upsert message", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(event_id = %record.event_id))]
    async fn insert_webhook_log(&self, record: &WebhookLogRecord) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_logs (
                event_id, event_type, event_date, raw_payload, processed, error_message, received_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(record.event_id.as_str())
        .bind(&record.event_type)
        .bind(at(&record.event_date))
        .bind(&record.raw_payload)
        .bind(record.processed)
        .bind(&record.error_message)
        .bind(at(&record.received_at))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("insert webhook log", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(level = "debug", skip(self, error_message))]
    async fn update_webhook_log(
        &self,
        event_id: &EventId,
        processed: bool,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE webhook_logs SET processed = $2, error_message = $3 WHERE event_id = $1",
        )
        .bind(event_id.as_str())
        .bind(processed)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("update webhook log", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                key: event_id.to_string(),
            });
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_webhook_log(
        &self,
        event_id: &EventId,
    ) -> Result<Option<WebhookLogRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT event_id, event_type, event_date, raw_payload, processed, error_message, received_at
            FROM webhook_logs
            WHERE event_id = $1
            "#,
        )
        .bind(event_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("get webhook log", e))?;
        row.as_ref().map(Self::log_from_row).transpose()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_unprocessed_logs(
        &self,
        limit: usize,
    ) -> Result<Vec<WebhookLogRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT event_id, event_type, event_date, raw_payload, processed, error_message, received_at
            FROM webhook_logs
            WHERE NOT processed
            ORDER BY received_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("list unprocessed webhook logs", e))?;
        rows.iter().map(Self::log_from_row).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("ping", e))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "postgres_store_tests.rs"]
mod tests;
