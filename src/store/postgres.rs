use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::LeadStore;
use crate::auth::AppRole;
use crate::errors::StoreError;
use crate::models::{
    Course, Lead, LeadStatus, LeadView, NewCourse, NewLead, NewSchedule, Schedule,
    ScheduleOption, ScheduleView, SiteSettings,
};

const LEAD_VIEW_SELECT: &str = r#"
    SELECT l.id, l.course_id, l.schedule_id, l.full_name, l.birth_date, l.cpf, l.phone,
           l.email, l.city, l.state, l.observations, l.terms_accepted,
           l.recording_authorized, l.status, l.source, l.user_agent, l.ip_address,
           l.created_at, l.updated_at,
           c.title AS course_title,
           s.start_date AS schedule_date,
           s.location AS schedule_location
    FROM leads l
    LEFT JOIN courses c ON c.id = l.course_id
    LEFT JOIN schedules s ON s.id = l.schedule_id
"#;

const COURSE_COLUMNS: &str =
    "id, slug, title, level, description, duration_hours, max_students, is_active";

const SCHEDULE_COLUMNS: &str = "id, course_id, start_date, end_date, location, max_students, \
     enrolled_count, status::text AS status, notes";

const SCHEDULE_VIEW_SELECT: &str = r#"
    SELECT s.id, s.course_id, s.start_date, s.end_date, s.location, s.max_students,
           s.enrolled_count, s.status::text AS status, s.notes,
           c.title AS course_title
    FROM schedules s
    LEFT JOIN courses c ON c.id = s.course_id
"#;

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Splits constraint violations from connectivity and other failures.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation()
            || db_err.is_foreign_key_violation()
            || db_err.is_check_violation()
        {
            return StoreError::Constraint(db_err.message().to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let row = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (
                course_id, schedule_id, full_name, birth_date, cpf, phone, email,
                city, state, observations, terms_accepted, recording_authorized,
                status, source, user_agent, ip_address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id, course_id, schedule_id, full_name, birth_date, cpf, phone, email,
                      city, state, observations, terms_accepted, recording_authorized,
                      status, source, user_agent, ip_address, created_at, updated_at
            "#,
        )
        .bind(lead.course_id)
        .bind(lead.schedule_id)
        .bind(&lead.full_name)
        .bind(lead.birth_date)
        .bind(&lead.cpf)
        .bind(&lead.phone)
        .bind(&lead.email)
        .bind(&lead.city)
        .bind(&lead.state)
        .bind(&lead.observations)
        .bind(lead.terms_accepted)
        .bind(lead.recording_authorized)
        .bind(lead.status)
        .bind(&lead.source)
        .bind(&lead.user_agent)
        .bind(&lead.ip_address)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        tracing::debug!("✓ Inserted lead {}", row.id);
        Ok(row)
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, StoreError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            SELECT id, course_id, schedule_id, full_name, birth_date, cpf, phone, email,
                   city, state, observations, terms_accepted, recording_authorized,
                   status, source, user_agent, ip_address, created_at, updated_at
            FROM leads
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    async fn list_lead_views(&self, limit: i64) -> Result<Vec<LeadView>, StoreError> {
        let sql = format!("{LEAD_VIEW_SELECT} ORDER BY l.created_at DESC LIMIT $1");
        let views = sqlx::query_as::<_, LeadView>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(views)
    }

    async fn get_lead_view(&self, id: Uuid) -> Result<Option<LeadView>, StoreError> {
        let sql = format!("{LEAD_VIEW_SELECT} WHERE l.id = $1");
        let view = sqlx::query_as::<_, LeadView>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(view)
    }

    async fn update_lead_status(&self, id: Uuid, status: LeadStatus) -> Result<bool, StoreError> {
        // updated_at is maintained by the leads_touch_updated_at trigger.
        let result = sqlx::query("UPDATE leads SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_leads(&self, since: Option<DateTime<Utc>>) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM leads WHERE $1::timestamptz IS NULL OR created_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn lead_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let stamps = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT created_at FROM leads WHERE created_at >= $1 ORDER BY created_at ASC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(stamps)
    }

    async fn list_active_courses(&self) -> Result<Vec<Course>, StoreError> {
        let sql =
            format!("SELECT {COURSE_COLUMNS} FROM courses WHERE is_active = true ORDER BY title");
        let courses = sqlx::query_as::<_, Course>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(courses)
    }

    async fn count_active_courses(&self) -> Result<i64, StoreError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE is_active = true")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn list_open_schedules(&self) -> Result<Vec<ScheduleOption>, StoreError> {
        let sql =
            format!("{SCHEDULE_VIEW_SELECT} WHERE s.status = 'aberto' ORDER BY s.start_date ASC");
        let rows = sqlx::query_as::<_, ScheduleView>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| ScheduleOption::from_schedule(&row.schedule, row.course_title.as_deref()))
            .collect())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY title");
        let courses = sqlx::query_as::<_, Course>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(courses)
    }

    async fn insert_course(&self, course: NewCourse) -> Result<Course, StoreError> {
        let sql = format!(
            "INSERT INTO courses (slug, title, level, description, duration_hours, max_students, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {COURSE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Course>(&sql)
            .bind(&course.slug)
            .bind(&course.title)
            .bind(&course.level)
            .bind(&course.description)
            .bind(course.duration_hours)
            .bind(course.max_students)
            .bind(course.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        tracing::debug!("✓ Inserted course {} ({})", row.id, row.slug);
        Ok(row)
    }

    async fn update_course(
        &self,
        id: Uuid,
        course: NewCourse,
    ) -> Result<Option<Course>, StoreError> {
        let sql = format!(
            "UPDATE courses SET slug = $2, title = $3, level = $4, description = $5, \
             duration_hours = $6, max_students = $7, is_active = $8 \
             WHERE id = $1 RETURNING {COURSE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .bind(&course.slug)
            .bind(&course.title)
            .bind(&course.level)
            .bind(&course.description)
            .bind(course.duration_hours)
            .bind(course.max_students)
            .bind(course.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        Ok(row)
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError> {
        // Schedules cascade; leads.course_id and leads.schedule_id are SET NULL.
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_schedules(&self) -> Result<Vec<ScheduleView>, StoreError> {
        let sql = format!("{SCHEDULE_VIEW_SELECT} ORDER BY s.start_date ASC");
        let rows = sqlx::query_as::<_, ScheduleView>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn insert_schedule(&self, schedule: NewSchedule) -> Result<Schedule, StoreError> {
        let sql = format!(
            "INSERT INTO schedules (course_id, start_date, end_date, location, max_students, status, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {SCHEDULE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Schedule>(&sql)
            .bind(schedule.course_id)
            .bind(schedule.start_date)
            .bind(schedule.end_date)
            .bind(&schedule.location)
            .bind(schedule.max_students)
            .bind(schedule.status)
            .bind(&schedule.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        tracing::debug!("✓ Inserted schedule {}", row.id);
        Ok(row)
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        schedule: NewSchedule,
    ) -> Result<Option<Schedule>, StoreError> {
        let sql = format!(
            "UPDATE schedules SET course_id = $2, start_date = $3, end_date = $4, location = $5, \
             max_students = $6, status = $7, notes = $8 \
             WHERE id = $1 RETURNING {SCHEDULE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Schedule>(&sql)
            .bind(id)
            .bind(schedule.course_id)
            .bind(schedule.start_date)
            .bind(schedule.end_date)
            .bind(&schedule.location)
            .bind(schedule.max_students)
            .bind(schedule.status)
            .bind(&schedule.notes)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        Ok(row)
    }

    async fn delete_schedule(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_site_settings(&self) -> Result<Option<SiteSettings>, StoreError> {
        let settings = sqlx::query_as::<_, SiteSettings>(
            r#"
            SELECT site_name, contact_email, whatsapp, maps_url, notify_email, notify_new_lead
            FROM site_settings
            WHERE id = 'main'
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn save_site_settings(&self, settings: SiteSettings) -> Result<SiteSettings, StoreError> {
        let row = sqlx::query_as::<_, SiteSettings>(
            r#"
            INSERT INTO site_settings (
                id, site_name, contact_email, whatsapp, maps_url, notify_email, notify_new_lead
            )
            VALUES ('main', $1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                site_name = EXCLUDED.site_name,
                contact_email = EXCLUDED.contact_email,
                whatsapp = EXCLUDED.whatsapp,
                maps_url = EXCLUDED.maps_url,
                notify_email = EXCLUDED.notify_email,
                notify_new_lead = EXCLUDED.notify_new_lead
            RETURNING site_name, contact_email, whatsapp, maps_url, notify_email, notify_new_lead
            "#,
        )
        .bind(&settings.site_name)
        .bind(&settings.contact_email)
        .bind(&settings.whatsapp)
        .bind(&settings.maps_url)
        .bind(&settings.notify_email)
        .bind(settings.notify_new_lead)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Ok(row)
    }

    async fn user_for_token(&self, token_sha256: &str) -> Result<Option<Uuid>, StoreError> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM admin_tokens WHERE token_sha256 = $1",
        )
        .bind(token_sha256)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<AppRole>, StoreError> {
        let roles =
            sqlx::query_scalar::<_, AppRole>("SELECT role FROM user_roles WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(roles)
    }

    async fn revoke_token(&self, token_sha256: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM admin_tokens WHERE token_sha256 = $1")
            .bind(token_sha256)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
