//! Courses, schedules and site settings.
//!
//! Listings for the public form are open; every write takes a
//! [`StaffSession`]. Schedule writes never carry the enrolment counter.

use std::sync::Arc;

use crate::auth::StaffSession;
use crate::errors::{CatalogError, FieldErrors, LoadError, StoreError};
use crate::models::{
    Course, CourseInput, NewCourse, NewSchedule, Schedule, ScheduleInput, ScheduleOption,
    ScheduleStatus, ScheduleView, SiteSettings,
};
use crate::store::LeadStore;
use crate::validation::{sanitize_input, validate_email};
use uuid::Uuid;

pub const COURSE_LEVELS: [&str; 4] = ["iniciante", "modular", "tatico", "avancado"];

/// Seats offered when a schedule payload leaves them out.
pub const DEFAULT_SCHEDULE_SEATS: i32 = 12;

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn LeadStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    /// Active courses, ordered by title.
    pub async fn list_active_courses(&self) -> Result<Vec<Course>, LoadError> {
        Ok(self.store.list_active_courses().await?)
    }

    /// Schedules open for enrolment, soonest first, with remaining seats.
    /// The enrolment counter is only read here.
    pub async fn list_open_schedules(&self) -> Result<Vec<ScheduleOption>, LoadError> {
        Ok(self.store.list_open_schedules().await?)
    }

    /// Saved settings, or the defaults when nothing was saved yet.
    pub async fn site_settings(&self) -> Result<SiteSettings, LoadError> {
        Ok(self.store.get_site_settings().await?.unwrap_or_default())
    }

    // ── Staff ─────────────────────────────────────────────────────────────

    pub async fn courses(&self, _session: &StaffSession) -> Result<Vec<Course>, LoadError> {
        Ok(self.store.list_courses().await?)
    }

    pub async fn create_course(
        &self,
        session: &StaffSession,
        input: CourseInput,
    ) -> Result<Course, CatalogError> {
        let course = validate_course(&input).map_err(CatalogError::Validation)?;
        let created = self
            .store
            .insert_course(course)
            .await
            .map_err(slug_conflict)?;

        tracing::info!(
            "✓ Course {} ({}) created by {}",
            created.id,
            created.slug,
            session.user_id()
        );
        Ok(created)
    }

    pub async fn update_course(
        &self,
        session: &StaffSession,
        id: Uuid,
        input: CourseInput,
    ) -> Result<Course, CatalogError> {
        let course = validate_course(&input).map_err(CatalogError::Validation)?;
        let updated = self
            .store
            .update_course(id, course)
            .await
            .map_err(slug_conflict)?
            .ok_or_else(|| CatalogError::NotFound(format!("Course {}", id)))?;

        tracing::info!("✓ Course {} updated by {}", id, session.user_id());
        Ok(updated)
    }

    /// Removes the course together with its schedules.
    pub async fn delete_course(&self, session: &StaffSession, id: Uuid) -> Result<(), CatalogError> {
        if !self.store.delete_course(id).await? {
            return Err(CatalogError::NotFound(format!("Course {}", id)));
        }
        tracing::info!("🗑️  Course {} deleted by {}", id, session.user_id());
        Ok(())
    }

    pub async fn schedules(&self, _session: &StaffSession) -> Result<Vec<ScheduleView>, LoadError> {
        Ok(self.store.list_schedules().await?)
    }

    pub async fn create_schedule(
        &self,
        session: &StaffSession,
        input: ScheduleInput,
    ) -> Result<Schedule, CatalogError> {
        let schedule = validate_schedule(&input).map_err(CatalogError::Validation)?;
        let created = self
            .store
            .insert_schedule(schedule)
            .await
            .map_err(unknown_course)?;

        tracing::info!(
            "✓ Schedule {} created by {}",
            created.id,
            session.user_id()
        );
        Ok(created)
    }

    pub async fn update_schedule(
        &self,
        session: &StaffSession,
        id: Uuid,
        input: ScheduleInput,
    ) -> Result<Schedule, CatalogError> {
        let schedule = validate_schedule(&input).map_err(CatalogError::Validation)?;
        let updated = self
            .store
            .update_schedule(id, schedule)
            .await
            .map_err(unknown_course)?
            .ok_or_else(|| CatalogError::NotFound(format!("Schedule {}", id)))?;

        tracing::info!("✓ Schedule {} updated by {}", id, session.user_id());
        Ok(updated)
    }

    pub async fn delete_schedule(
        &self,
        session: &StaffSession,
        id: Uuid,
    ) -> Result<(), CatalogError> {
        if !self.store.delete_schedule(id).await? {
            return Err(CatalogError::NotFound(format!("Schedule {}", id)));
        }
        tracing::info!("🗑️  Schedule {} deleted by {}", id, session.user_id());
        Ok(())
    }

    pub async fn save_site_settings(
        &self,
        session: &StaffSession,
        input: SiteSettings,
    ) -> Result<SiteSettings, CatalogError> {
        let settings = validate_site_settings(input).map_err(CatalogError::Validation)?;
        let saved = self.store.save_site_settings(settings).await?;

        tracing::info!("✓ Site settings saved by {}", session.user_id());
        Ok(saved)
    }
}

/// The only constraint on courses is the unique slug.
fn slug_conflict(err: StoreError) -> CatalogError {
    match err {
        StoreError::Constraint(_) => CatalogError::SlugTaken,
        other => CatalogError::Store(other),
    }
}

fn unknown_course(err: StoreError) -> CatalogError {
    match err {
        StoreError::Constraint(_) => {
            let mut errors = FieldErrors::new();
            errors.add("course_id", "Curso não encontrado");
            CatalogError::Validation(errors)
        }
        other => CatalogError::Store(other),
    }
}

/// Lowercase, blanks and underscores to `-`, other symbols dropped, no
/// leading, trailing or doubled dashes.
pub fn normalize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        let c = if c.is_whitespace() || c == '_' { '-' } else { c };
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if c == '-' && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

pub fn validate_course(input: &CourseInput) -> Result<NewCourse, FieldErrors> {
    let mut errors = FieldErrors::new();

    let title = sanitize_input(&input.title);
    if title.is_empty() {
        errors.add("title", "Título é obrigatório.");
    }
    let slug = normalize_slug(&input.slug);
    if slug.is_empty() {
        errors.add("slug", "Slug é obrigatório.");
    }
    let description = input.description.trim().to_string();
    if description.is_empty() {
        errors.add("description", "Descrição é obrigatória.");
    }
    let level = input.level.trim().to_lowercase();
    if !COURSE_LEVELS.contains(&level.as_str()) {
        errors.add("level", "Nível inválido.");
    }
    if input.duration_hours <= 0 {
        errors.add("duration_hours", "Duração deve ser > 0.");
    }
    if input.max_students <= 0 {
        errors.add("max_students", "Vagas devem ser > 0.");
    }

    errors.into_result()?;
    Ok(NewCourse {
        slug,
        title,
        level,
        description,
        duration_hours: input.duration_hours,
        max_students: input.max_students,
        is_active: input.is_active,
    })
}

pub fn validate_schedule(input: &ScheduleInput) -> Result<NewSchedule, FieldErrors> {
    let mut errors = FieldErrors::new();

    if input.course_id.is_none() {
        errors.add("course_id", "Curso é obrigatório.");
    }
    if input.start_date.is_none() {
        errors.add("start_date", "Data de início é obrigatória.");
    }
    if let (Some(start), Some(end)) = (input.start_date, input.end_date) {
        if end < start {
            errors.add("end_date", "Término antes do início.");
        }
    }
    let max_students = input.max_students.unwrap_or(DEFAULT_SCHEDULE_SEATS);
    if max_students <= 0 {
        errors.add("max_students", "Vagas devem ser > 0.");
    }
    let status = match input.status.as_deref() {
        None => Some(ScheduleStatus::Aberto),
        Some(raw) => raw.parse::<ScheduleStatus>().ok(),
    };
    if status.is_none() {
        errors.add("status", "Status inválido.");
    }

    match (input.course_id, input.start_date, status) {
        (Some(course_id), Some(start_date), Some(status)) if errors.is_empty() => {
            Ok(NewSchedule {
                course_id,
                start_date,
                end_date: input.end_date,
                location: sanitize_input(&input.location),
                max_students,
                status,
                notes: input
                    .notes
                    .as_deref()
                    .map(sanitize_input)
                    .filter(|n| !n.is_empty()),
            })
        }
        _ => Err(errors),
    }
}

pub fn validate_site_settings(input: SiteSettings) -> Result<SiteSettings, FieldErrors> {
    let mut errors = FieldErrors::new();

    let site_name = sanitize_input(&input.site_name);
    if site_name.is_empty() {
        errors.add("site_name", "Nome do site é obrigatório.");
    }
    let contact_email = input.contact_email.trim().to_lowercase();
    if !validate_email(&contact_email) {
        errors.add("contact_email", "E-mail inválido");
    }
    let notify_email = match input.notify_email.trim() {
        "" => contact_email.clone(),
        other => other.to_lowercase(),
    };
    if !validate_email(&notify_email) {
        errors.add("notify_email", "E-mail inválido");
    }

    errors.into_result()?;
    Ok(SiteSettings {
        site_name,
        contact_email,
        whatsapp: sanitize_input(&input.whatsapp),
        maps_url: input.maps_url.trim().to_string(),
        notify_email,
        notify_new_lead: input.notify_new_lead,
    })
}
