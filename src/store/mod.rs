//! The `LeadStore` trait: the persistent store as seen by the lead lifecycle.
//!
//! Every method is a single atomic query (one row written, or one read).
//! Nothing here spans tables in a transaction, locks, or versions rows.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::AppRole;
use crate::errors::StoreError;
use crate::models::{
    Course, Lead, LeadStatus, LeadView, NewCourse, NewLead, NewSchedule, Schedule,
    ScheduleOption, ScheduleView, SiteSettings,
};

pub use memory::MemoryLeadStore;
pub use postgres::PgLeadStore;

#[async_trait]
pub trait LeadStore: Send + Sync {
    // ── Leads ─────────────────────────────────────────────────────────────

    /// Insert one lead and return the persisted row.
    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError>;

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, StoreError>;

    /// Up to `limit` leads joined with course/schedule display data,
    /// newest first.
    async fn list_lead_views(&self, limit: i64) -> Result<Vec<LeadView>, StoreError>;

    async fn get_lead_view(&self, id: Uuid) -> Result<Option<LeadView>, StoreError>;

    /// Returns `false` when no lead has this id.
    async fn update_lead_status(&self, id: Uuid, status: LeadStatus) -> Result<bool, StoreError>;

    /// Number of leads created at or after `since` (all leads when `None`).
    async fn count_leads(&self, since: Option<DateTime<Utc>>) -> Result<i64, StoreError>;

    /// Creation timestamps at or after `since`, oldest first.
    async fn lead_created_since(&self, since: DateTime<Utc>)
        -> Result<Vec<DateTime<Utc>>, StoreError>;

    // ── Catalog ───────────────────────────────────────────────────────────

    /// Active courses ordered by title.
    async fn list_active_courses(&self) -> Result<Vec<Course>, StoreError>;

    async fn count_active_courses(&self) -> Result<i64, StoreError>;

    /// Open schedules ordered by start date.
    async fn list_open_schedules(&self) -> Result<Vec<ScheduleOption>, StoreError>;

    /// Every course, active or not, ordered by title.
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError>;

    /// Fails with [`StoreError::Constraint`] when the slug is taken.
    async fn insert_course(&self, course: NewCourse) -> Result<Course, StoreError>;

    /// `None` when no course has this id.
    async fn update_course(&self, id: Uuid, course: NewCourse)
        -> Result<Option<Course>, StoreError>;

    /// Removes the course and its schedules; leads keep their row with the
    /// reference cleared. Returns `false` when no course has this id.
    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Every schedule with its course title, ordered by start date.
    async fn list_schedules(&self) -> Result<Vec<ScheduleView>, StoreError>;

    /// New schedules start with no enrolments.
    async fn insert_schedule(&self, schedule: NewSchedule) -> Result<Schedule, StoreError>;

    /// Leaves `enrolled_count` untouched. `None` when no schedule has this id.
    async fn update_schedule(
        &self,
        id: Uuid,
        schedule: NewSchedule,
    ) -> Result<Option<Schedule>, StoreError>;

    /// Leads referencing the schedule keep their row with the reference cleared.
    async fn delete_schedule(&self, id: Uuid) -> Result<bool, StoreError>;

    // ── Site settings ─────────────────────────────────────────────────────

    /// The single settings row, if it was ever saved.
    async fn get_site_settings(&self) -> Result<Option<SiteSettings>, StoreError>;

    /// Inserts or replaces the single settings row.
    async fn save_site_settings(&self, settings: SiteSettings)
        -> Result<SiteSettings, StoreError>;

    // ── Staff ─────────────────────────────────────────────────────────────

    /// User owning the token whose SHA-256 (hex) is given.
    async fn user_for_token(&self, token_sha256: &str) -> Result<Option<Uuid>, StoreError>;

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<AppRole>, StoreError>;

    /// Deletes a bearer token. Returns `false` when it was not registered.
    async fn revoke_token(&self, token_sha256: &str) -> Result<bool, StoreError>;
}
