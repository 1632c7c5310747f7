pub mod credentials;

pub use credentials::{CredentialError, CredentialResolver};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use doorbot_core::types::{
    ConversationEntry, ConversationRecord, CustomerProfile, LineUserRecord, PropertySummary,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{info, instrument};
use uuid::Uuid;

/// SQLite-backed persistence for tenants, the conversation log, LINE users
/// and the tenant inventory. All writes are single-row inserts/upserts;
/// the pipeline treats them as independent best-effort operations.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct TenantLineSettings {
    pub channel_secret: Option<String>,
    pub access_token: Option<String>,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to SQLite database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        info!("SqliteStore initialized");
        Ok(Self { pool })
    }

    #[instrument(skip(self))]
    pub async fn create_tenant(&self, tenant_id: &str, name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (id, name)
            VALUES (?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .execute(&self.pool)
        .await
        .context("Failed to create tenant")?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn tenant_name(&self, tenant_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch tenant")?;
        Ok(row.map(|r| r.0))
    }

    /// Raw LINE settings for a tenant, or None when the tenant is absent.
    /// Credential classification (not-found vs missing) lives in the
    /// resolver on top of this.
    #[instrument(skip(self))]
    pub async fn line_settings(&self, tenant_id: &str) -> Result<Option<TenantLineSettings>> {
        let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT line_channel_secret, line_channel_access_token
            FROM tenants
            WHERE id = ?
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch tenant LINE settings")?;

        Ok(row.map(|(channel_secret, access_token)| TenantLineSettings {
            channel_secret,
            access_token,
        }))
    }

    /// Store channel secret and access token for an existing tenant.
    /// Returns false when the tenant does not exist (settings updates
    /// never create tenants).
    #[instrument(skip(self, channel_secret, access_token))]
    pub async fn save_line_settings(
        &self,
        tenant_id: &str,
        channel_secret: &str,
        access_token: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET line_channel_secret = ?,
                line_channel_access_token = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(channel_secret)
        .bind(access_token)
        .bind(tenant_id)
        .execute(&self.pool)
        .await
        .context("Failed to save tenant LINE settings")?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, entry))]
    pub async fn record_conversation(&self, entry: &ConversationEntry) -> Result<()> {
        let metadata_json = match &entry.metadata {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO conversations (id, tenant_id, user_id, message_type, user_message, bot_reply, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&entry.tenant_id)
        .bind(&entry.user_id)
        .bind(entry.kind.as_str())
        .bind(&entry.user_message)
        .bind(&entry.bot_reply)
        .bind(metadata_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to insert conversation")?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn conversation_history(
        &self,
        tenant_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ConversationRecord>> {
        let rows = sqlx::query_as::<
            _,
            (
                String,
                String,
                String,
                String,
                String,
                Option<String>,
                DateTime<Utc>,
            ),
        >(
            r#"
            SELECT id, tenant_id, user_id, message_type, user_message, bot_reply, created_at
            FROM conversations
            WHERE tenant_id = ?
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch conversation history")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, tenant_id, user_id, message_type, user_message, bot_reply, created_at)| {
                    ConversationRecord {
                        id,
                        tenant_id,
                        user_id,
                        message_type,
                        user_message,
                        bot_reply,
                        created_at,
                    }
                },
            )
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn conversation_count(&self, tenant_id: &str, user_id: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM conversations WHERE tenant_id = ? AND user_id = ?",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count conversations")?;
        Ok(row.0)
    }

    /// Recent exchanges for one tenant+user, newest first. Feeds the AI
    /// strategy's conversation window.
    #[instrument(skip(self))]
    pub async fn recent_exchanges(
        &self,
        tenant_id: &str,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<(String, Option<String>)>> {
        let rows = sqlx::query_as::<_, (String, Option<String>)>(
            r#"
            SELECT user_message, bot_reply
            FROM conversations
            WHERE tenant_id = ? AND user_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent exchanges")?;
        Ok(rows)
    }

    /// First contact creates the row with blocked=false; later contacts
    /// only refresh last-seen (and display name when newly learned).
    #[instrument(skip(self))]
    pub async fn upsert_line_user(
        &self,
        tenant_id: &str,
        line_user_id: &str,
        display_name: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO line_users (tenant_id, line_user_id, display_name, is_blocked, first_interaction_at, last_interaction_at)
            VALUES (?, ?, ?, 0, ?, ?)
            ON CONFLICT (tenant_id, line_user_id) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, line_users.display_name),
                last_interaction_at = excluded.last_interaction_at
            "#,
        )
        .bind(tenant_id)
        .bind(line_user_id)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to upsert LINE user")?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn line_user(
        &self,
        tenant_id: &str,
        line_user_id: &str,
    ) -> Result<Option<LineUserRecord>> {
        let row = sqlx::query_as::<
            _,
            (
                String,
                String,
                Option<String>,
                bool,
                DateTime<Utc>,
                DateTime<Utc>,
            ),
        >(
            r#"
            SELECT tenant_id, line_user_id, display_name, is_blocked, first_interaction_at, last_interaction_at
            FROM line_users
            WHERE tenant_id = ? AND line_user_id = ?
            "#,
        )
        .bind(tenant_id)
        .bind(line_user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch LINE user")?;

        Ok(row.map(Self::line_user_from_row))
    }

    #[instrument(skip(self))]
    pub async fn line_users(
        &self,
        tenant_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LineUserRecord>> {
        let rows = sqlx::query_as::<
            _,
            (
                String,
                String,
                Option<String>,
                bool,
                DateTime<Utc>,
                DateTime<Utc>,
            ),
        >(
            r#"
            SELECT tenant_id, line_user_id, display_name, is_blocked, first_interaction_at, last_interaction_at
            FROM line_users
            WHERE tenant_id = ?
            ORDER BY last_interaction_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list LINE users")?;

        Ok(rows.into_iter().map(Self::line_user_from_row).collect())
    }

    fn line_user_from_row(
        row: (
            String,
            String,
            Option<String>,
            bool,
            DateTime<Utc>,
            DateTime<Utc>,
        ),
    ) -> LineUserRecord {
        let (tenant_id, line_user_id, display_name, is_blocked, first, last) = row;
        LineUserRecord {
            tenant_id,
            line_user_id,
            display_name,
            is_blocked,
            first_interaction_at: first,
            last_interaction_at: last,
        }
    }

    #[instrument(skip(self))]
    pub async fn customer_by_line_user(
        &self,
        tenant_id: &str,
        line_user_id: &str,
    ) -> Result<Option<CustomerProfile>> {
        let row = sqlx::query_as::<
            _,
            (
                Option<String>,
                Option<i64>,
                Option<i64>,
                Option<String>,
                Option<String>,
                String,
            ),
        >(
            r#"
            SELECT name, budget_min, budget_max, desired_area, desired_floor_plan, status
            FROM customers
            WHERE tenant_id = ? AND line_user_id = ?
            "#,
        )
        .bind(tenant_id)
        .bind(line_user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch customer")?;

        Ok(row.map(
            |(name, budget_min, budget_max, desired_area, desired_floor_plan, status)| {
                CustomerProfile {
                    name,
                    budget_min,
                    budget_max,
                    desired_area,
                    desired_floor_plan,
                    status: Some(status),
                }
            },
        ))
    }

    #[instrument(skip(self))]
    pub async fn properties(&self, tenant_id: &str) -> Result<Vec<PropertySummary>> {
        let rows = sqlx::query_as::<
            _,
            (
                String,
                String,
                Option<i64>,
                Option<String>,
                Option<String>,
                Option<i64>,
                String,
            ),
        >(
            r#"
            SELECT id, title, rent_price, floor_plan, station, walking_minutes, status
            FROM properties
            WHERE tenant_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list properties")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, title, rent_price, floor_plan, station, walking_minutes, status)| {
                    PropertySummary {
                        id,
                        title,
                        rent_price,
                        floor_plan,
                        station,
                        walking_minutes,
                        status,
                    }
                },
            )
            .collect())
    }
}
