use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{
    Agenda, AgendaKind, AgendaStatus, AttachmentRegistry, ContactPoint, MeetingMethod, Minutes,
    Schedule, SessionKey, SessionRecord, StatusTransition, Urgency,
};
use crate::error::{QuorumError, Result};

use super::AgendaRepository;

const UPDATE_AGENDA_SQL: &str = r#"
    UPDATE agendas SET
        kind = $2, title = $3,
        director_codes = $4, initiator_codes = $5, support_codes = $6,
        contact_name = $7, contact_position = $8, contact_phone = $9,
        urgency = $10, target_date = $11, status = $12,
        execution_date = $13, start_time = $14, end_time = $15,
        method = $16, location = $17, link = $18,
        minutes = $19, conduct = $20,
        group_id = $21, meeting_number = $22, meeting_year = $23,
        attachments = $24, updated_at = $25
    WHERE id = $1
    "#;

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Create a PostgreSQL store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    fn update_query(agenda: &Agenda) -> Result<sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>> {
        let query = sqlx::query(UPDATE_AGENDA_SQL)
            .bind(agenda.id)
            .bind(agenda.kind.as_str())
            .bind(&agenda.title)
            .bind(serde_json::to_value(&agenda.director_codes)?)
            .bind(serde_json::to_value(&agenda.initiator_codes)?)
            .bind(serde_json::to_value(&agenda.support_codes)?)
            .bind(&agenda.contact.name)
            .bind(&agenda.contact.position)
            .bind(&agenda.contact.phone)
            .bind(agenda.urgency.as_str())
            .bind(agenda.target_date)
            .bind(agenda.status.as_str())
            .bind(agenda.schedule.as_ref().map(|s| s.execution_date))
            .bind(agenda.schedule.as_ref().map(|s| s.start_time))
            .bind(agenda.schedule.as_ref().and_then(|s| s.end_time))
            .bind(agenda.schedule.as_ref().map(|s| s.method.as_str()))
            .bind(agenda.schedule.as_ref().and_then(|s| s.location.clone()))
            .bind(agenda.schedule.as_ref().and_then(|s| s.link.clone()))
            .bind(serde_json::to_value(&agenda.minutes)?)
            .bind(
                agenda
                    .conduct
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
            )
            .bind(agenda.correlation.map(|k| k.group_id))
            .bind(agenda.correlation.map(|k| k.meeting_number))
            .bind(agenda.correlation.map(|k| k.meeting_year))
            .bind(serde_json::to_value(&agenda.attachments)?)
            .bind(agenda.updated_at);
        Ok(query)
    }
}

fn agenda_from_row(row: &PgRow) -> Result<Agenda> {
    let kind: String = row.get("kind");
    let kind = AgendaKind::try_from(kind.as_str()).map_err(QuorumError::Internal)?;
    let urgency: String = row.get("urgency");
    let urgency = Urgency::try_from(urgency.as_str()).map_err(QuorumError::Internal)?;
    let status: String = row.get("status");
    let status = AgendaStatus::try_from(status.as_str()).map_err(QuorumError::Internal)?;

    let schedule = match row.get::<Option<NaiveDate>, _>("execution_date") {
        Some(execution_date) => {
            let start_time = row
                .get::<Option<NaiveTime>, _>("start_time")
                .ok_or_else(|| QuorumError::Internal("schedule row missing start_time".into()))?;
            let method: Option<String> = row.get("method");
            let method = method
                .as_deref()
                .map(MeetingMethod::try_from)
                .transpose()
                .map_err(QuorumError::Internal)?
                .ok_or_else(|| QuorumError::Internal("schedule row missing method".into()))?;
            Some(Schedule {
                execution_date,
                start_time,
                end_time: row.get("end_time"),
                method,
                location: row.get("location"),
                link: row.get("link"),
            })
        }
        None => None,
    };

    let correlation = match row.get::<Option<Uuid>, _>("group_id") {
        Some(group_id) => Some(SessionKey {
            group_id,
            meeting_number: row
                .get::<Option<i32>, _>("meeting_number")
                .ok_or_else(|| QuorumError::Internal("group row missing meeting_number".into()))?,
            meeting_year: row
                .get::<Option<i32>, _>("meeting_year")
                .ok_or_else(|| QuorumError::Internal("group row missing meeting_year".into()))?,
        }),
        None => None,
    };

    let minutes: Minutes = serde_json::from_value(row.get("minutes"))?;
    let conduct: Option<SessionRecord> = row
        .get::<Option<serde_json::Value>, _>("conduct")
        .map(serde_json::from_value)
        .transpose()?;
    let attachments: AttachmentRegistry = serde_json::from_value(row.get("attachments"))?;

    Ok(Agenda {
        id: row.get("id"),
        kind,
        title: row.get("title"),
        director_codes: serde_json::from_value(row.get("director_codes"))?,
        initiator_codes: serde_json::from_value(row.get("initiator_codes"))?,
        support_codes: serde_json::from_value(row.get("support_codes"))?,
        contact: ContactPoint {
            name: row.get("contact_name"),
            position: row.get("contact_position"),
            phone: row.get("contact_phone"),
        },
        urgency,
        target_date: row.get("target_date"),
        status,
        schedule,
        minutes,
        conduct,
        correlation,
        attachments,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn transition_from_row(row: &PgRow) -> Result<StatusTransition> {
    let from: String = row.get("from_status");
    let to: String = row.get("to_status");
    Ok(StatusTransition {
        from: AgendaStatus::try_from(from.as_str()).map_err(QuorumError::Internal)?,
        to: AgendaStatus::try_from(to.as_str()).map_err(QuorumError::Internal)?,
        reason: row.get("reason"),
        timestamp: row.get("occurred_at"),
    })
}

#[async_trait]
impl AgendaRepository for PostgresStore {
    #[instrument(skip(self, agenda))]
    async fn insert(&self, agenda: &Agenda) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agendas (
                id, kind, title,
                director_codes, initiator_codes, support_codes,
                contact_name, contact_position, contact_phone,
                urgency, target_date, status,
                execution_date, start_time, end_time, method, location, link,
                minutes, conduct,
                group_id, meeting_number, meeting_year,
                attachments, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26
            )
            "#,
        )
        .bind(agenda.id)
        .bind(agenda.kind.as_str())
        .bind(&agenda.title)
        .bind(serde_json::to_value(&agenda.director_codes)?)
        .bind(serde_json::to_value(&agenda.initiator_codes)?)
        .bind(serde_json::to_value(&agenda.support_codes)?)
        .bind(&agenda.contact.name)
        .bind(&agenda.contact.position)
        .bind(&agenda.contact.phone)
        .bind(agenda.urgency.as_str())
        .bind(agenda.target_date)
        .bind(agenda.status.as_str())
        .bind(agenda.schedule.as_ref().map(|s| s.execution_date))
        .bind(agenda.schedule.as_ref().map(|s| s.start_time))
        .bind(agenda.schedule.as_ref().and_then(|s| s.end_time))
        .bind(agenda.schedule.as_ref().map(|s| s.method.as_str()))
        .bind(agenda.schedule.as_ref().and_then(|s| s.location.clone()))
        .bind(agenda.schedule.as_ref().and_then(|s| s.link.clone()))
        .bind(serde_json::to_value(&agenda.minutes)?)
        .bind(
            agenda
                .conduct
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(agenda.correlation.map(|k| k.group_id))
        .bind(agenda.correlation.map(|k| k.meeting_number))
        .bind(agenda.correlation.map(|k| k.meeting_year))
        .bind(serde_json::to_value(&agenda.attachments)?)
        .bind(agenda.created_at)
        .bind(agenda.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Inserted agenda {}", agenda.id);
        Ok(())
    }

    #[instrument(skip(self, agenda))]
    async fn update(&self, agenda: &Agenda) -> Result<()> {
        let result = Self::update_query(agenda)?.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(QuorumError::AgendaNotFound(agenda.id));
        }
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Agenda> {
        let row = sqlx::query("SELECT * FROM agendas WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(QuorumError::AgendaNotFound(id))?;
        agenda_from_row(&row)
    }

    async fn list_by_status(&self, status: AgendaStatus) -> Result<Vec<Agenda>> {
        let rows = sqlx::query(
            "SELECT * FROM agendas WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(agenda_from_row).collect()
    }

    async fn list_by_group(&self, group_id: Uuid) -> Result<Vec<Agenda>> {
        let rows = sqlx::query(
            "SELECT * FROM agendas WHERE group_id = $1 ORDER BY created_at ASC",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(agenda_from_row).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM agendas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(QuorumError::AgendaNotFound(id));
        }
        debug!("Deleted agenda {}", id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_many(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query("SELECT id, status FROM agendas WHERE id = ANY($1) FOR UPDATE")
            .bind(ids)
            .fetch_all(&mut *tx)
            .await?;

        let found: HashSet<Uuid> = rows.iter().map(|r| r.get::<Uuid, _>("id")).collect();
        if let Some(missing) = ids.iter().find(|id| !found.contains(id)) {
            return Err(QuorumError::AgendaNotFound(*missing));
        }
        let locked: Vec<Uuid> = rows
            .iter()
            .filter(|r| {
                AgendaStatus::try_from(r.get::<String, _>("status").as_str())
                    .map(|s| s.is_locked())
                    .unwrap_or(true)
            })
            .map(|r| r.get::<Uuid, _>("id"))
            .collect();
        if !locked.is_empty() {
            return Err(QuorumError::LockedBatch { ids: locked });
        }

        sqlx::query("DELETE FROM agendas WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("Deleted {} agendas", ids.len());
        Ok(())
    }

    async fn next_meeting_number(&self, kind: AgendaKind, year: i32) -> Result<i32> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(MAX(meeting_number), 0) + 1 AS next
            FROM agendas
            WHERE kind = $1 AND meeting_year = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(year)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("next"))
    }

    #[instrument(skip(self, members))]
    async fn finalize_group(&self, members: &[Agenda]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for member in members {
            let result = Self::update_query(member)?.execute(&mut *tx).await?;
            if result.rows_affected() == 0 {
                return Err(QuorumError::AgendaNotFound(member.id));
            }
        }

        tx.commit().await?;
        info!("Finalized group of {} agendas", members.len());
        Ok(())
    }

    async fn record_transition(
        &self,
        agenda_id: Uuid,
        transition: &StatusTransition,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agenda_transitions (agenda_id, from_status, to_status, reason, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(agenda_id)
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .bind(&transition.reason)
        .bind(transition.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transitions(&self, agenda_id: Uuid) -> Result<Vec<StatusTransition>> {
        let rows = sqlx::query(
            r#"
            SELECT from_status, to_status, reason, occurred_at
            FROM agenda_transitions
            WHERE agenda_id = $1
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(agenda_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(transition_from_row).collect()
    }
}
