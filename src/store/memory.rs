use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::LeadStore;
use crate::auth::{hash_token, AppRole};
use crate::errors::StoreError;
use crate::models::{
    Course, Lead, LeadStatus, LeadView, NewCourse, NewLead, NewSchedule, Schedule,
    ScheduleOption, ScheduleView, SiteSettings,
};
use crate::validation::{digits_only, validate_state};

#[derive(Default)]
struct Tables {
    leads: Vec<Lead>,
    courses: Vec<Course>,
    schedules: Vec<Schedule>,
    tokens: HashMap<String, Uuid>,
    roles: HashMap<Uuid, Vec<AppRole>>,
    settings: Option<SiteSettings>,
}

/// In-process store with the same constraints as the Postgres schema.
///
/// Used by the test-suite and for running the API without a database.
/// Reads and writes can be made to fail to exercise error paths.
#[derive(Default)]
pub struct MemoryLeadStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    inserts: AtomicUsize,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful lead inserts so far.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn add_course(&self, title: &str, is_active: bool) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            slug: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            level: "iniciante".to_string(),
            description: String::new(),
            duration_hours: 8,
            max_students: 12,
            is_active,
        };
        if let Ok(mut tables) = self.tables.write() {
            tables.courses.push(course.clone());
        }
        course
    }

    pub fn add_schedule(
        &self,
        course_id: Uuid,
        start_date: NaiveDate,
        location: &str,
        max_students: i32,
        enrolled_count: i32,
        status: &str,
    ) -> Schedule {
        let schedule = Schedule {
            id: Uuid::new_v4(),
            course_id,
            start_date,
            end_date: None,
            location: location.to_string(),
            max_students,
            enrolled_count,
            status: status.to_string(),
            notes: None,
        };
        if let Ok(mut tables) = self.tables.write() {
            tables.schedules.push(schedule.clone());
        }
        schedule
    }

    /// Registers a bearer token (stored hashed) for `user_id`.
    pub fn add_token(&self, token: &str, user_id: Uuid) {
        if let Ok(mut tables) = self.tables.write() {
            tables.tokens.insert(hash_token(token), user_id);
        }
    }

    pub fn grant_role(&self, user_id: Uuid, role: AppRole) {
        if let Ok(mut tables) = self.tables.write() {
            tables.roles.entry(user_id).or_default().push(role);
        }
    }

    /// Moves a lead's creation time, for time-window tests.
    pub fn set_created_at(&self, id: Uuid, created_at: DateTime<Utc>) {
        if let Ok(mut tables) = self.tables.write() {
            if let Some(lead) = tables.leads.iter_mut().find(|l| l.id == id) {
                lead.created_at = created_at;
            }
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

fn check_constraints(tables: &Tables, lead: &NewLead) -> Result<(), StoreError> {
    if lead.cpf.len() != 11 || digits_only(&lead.cpf) != lead.cpf {
        return Err(StoreError::Constraint("leads_cpf_check".to_string()));
    }
    if !matches!(lead.phone.len(), 10 | 11) || digits_only(&lead.phone) != lead.phone {
        return Err(StoreError::Constraint("leads_phone_check".to_string()));
    }
    if !validate_state(&lead.state) || lead.state.to_uppercase() != lead.state {
        return Err(StoreError::Constraint("leads_state_check".to_string()));
    }
    if !lead.terms_accepted {
        return Err(StoreError::Constraint("leads_terms_accepted_check".to_string()));
    }
    if let Some(course_id) = lead.course_id {
        if !tables.courses.iter().any(|c| c.id == course_id) {
            return Err(StoreError::Constraint("leads_course_id_fkey".to_string()));
        }
    }
    if let Some(schedule_id) = lead.schedule_id {
        if !tables.schedules.iter().any(|s| s.id == schedule_id) {
            return Err(StoreError::Constraint("leads_schedule_id_fkey".to_string()));
        }
    }
    Ok(())
}

fn check_course(tables: &Tables, id: Option<Uuid>, course: &NewCourse) -> Result<(), StoreError> {
    if tables
        .courses
        .iter()
        .any(|c| c.slug == course.slug && Some(c.id) != id)
    {
        return Err(StoreError::Constraint("courses_slug_key".to_string()));
    }
    Ok(())
}

fn check_schedule(tables: &Tables, schedule: &NewSchedule) -> Result<(), StoreError> {
    if !tables.courses.iter().any(|c| c.id == schedule.course_id) {
        return Err(StoreError::Constraint("schedules_course_id_fkey".to_string()));
    }
    if schedule.end_date.is_some_and(|end| end < schedule.start_date) {
        return Err(StoreError::Constraint("schedules_dates_check".to_string()));
    }
    Ok(())
}

fn course_title(tables: &Tables, course_id: Uuid) -> Option<&str> {
    tables
        .courses
        .iter()
        .find(|c| c.id == course_id)
        .map(|c| c.title.as_str())
}

fn join_view(tables: &Tables, lead: &Lead) -> LeadView {
    let course = lead
        .course_id
        .and_then(|id| tables.courses.iter().find(|c| c.id == id));
    let schedule = lead
        .schedule_id
        .and_then(|id| tables.schedules.iter().find(|s| s.id == id));

    LeadView {
        lead: lead.clone(),
        course_title: course.map(|c| c.title.clone()),
        schedule_date: schedule.map(|s| s.start_date),
        schedule_location: schedule.map(|s| s.location.clone()),
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let mut tables = self.write()?;
        check_constraints(&tables, &lead)?;

        let now = Utc::now();
        let row = Lead {
            id: Uuid::new_v4(),
            course_id: lead.course_id,
            schedule_id: lead.schedule_id,
            full_name: lead.full_name,
            birth_date: lead.birth_date,
            cpf: lead.cpf,
            phone: lead.phone,
            email: lead.email,
            city: lead.city,
            state: lead.state,
            observations: lead.observations,
            terms_accepted: lead.terms_accepted,
            recording_authorized: lead.recording_authorized,
            status: lead.status,
            source: lead.source,
            user_agent: lead.user_agent,
            ip_address: lead.ip_address,
            created_at: now,
            updated_at: now,
        };
        tables.leads.push(row.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);

        Ok(row)
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, StoreError> {
        let tables = self.read()?;
        Ok(tables.leads.iter().find(|l| l.id == id).cloned())
    }

    async fn list_lead_views(&self, limit: i64) -> Result<Vec<LeadView>, StoreError> {
        let tables = self.read()?;
        let mut leads: Vec<&Lead> = tables.leads.iter().rev().collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(leads
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|lead| join_view(&tables, lead))
            .collect())
    }

    async fn get_lead_view(&self, id: Uuid) -> Result<Option<LeadView>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .leads
            .iter()
            .find(|l| l.id == id)
            .map(|lead| join_view(&tables, lead)))
    }

    async fn update_lead_status(&self, id: Uuid, status: LeadStatus) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        match tables.leads.iter_mut().find(|l| l.id == id) {
            Some(lead) => {
                lead.status = status;
                lead.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_leads(&self, since: Option<DateTime<Utc>>) -> Result<i64, StoreError> {
        let tables = self.read()?;
        let count = tables
            .leads
            .iter()
            .filter(|l| since.map_or(true, |s| l.created_at >= s))
            .count();
        Ok(count as i64)
    }

    async fn lead_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let tables = self.read()?;
        let mut stamps: Vec<DateTime<Utc>> = tables
            .leads
            .iter()
            .map(|l| l.created_at)
            .filter(|created| *created >= since)
            .collect();
        stamps.sort();
        Ok(stamps)
    }

    async fn list_active_courses(&self) -> Result<Vec<Course>, StoreError> {
        let tables = self.read()?;
        let mut courses: Vec<Course> = tables
            .courses
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(courses)
    }

    async fn count_active_courses(&self) -> Result<i64, StoreError> {
        let tables = self.read()?;
        Ok(tables.courses.iter().filter(|c| c.is_active).count() as i64)
    }

    async fn list_open_schedules(&self) -> Result<Vec<ScheduleOption>, StoreError> {
        let tables = self.read()?;
        let mut open: Vec<&Schedule> = tables
            .schedules
            .iter()
            .filter(|s| s.status == "aberto")
            .collect();
        open.sort_by_key(|s| s.start_date);

        Ok(open
            .into_iter()
            .map(|s| ScheduleOption::from_schedule(s, course_title(&tables, s.course_id)))
            .collect())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let tables = self.read()?;
        let mut courses = tables.courses.clone();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(courses)
    }

    async fn insert_course(&self, course: NewCourse) -> Result<Course, StoreError> {
        let mut tables = self.write()?;
        check_course(&tables, None, &course)?;

        let row = Course {
            id: Uuid::new_v4(),
            slug: course.slug,
            title: course.title,
            level: course.level,
            description: course.description,
            duration_hours: course.duration_hours,
            max_students: course.max_students,
            is_active: course.is_active,
        };
        tables.courses.push(row.clone());
        Ok(row)
    }

    async fn update_course(
        &self,
        id: Uuid,
        course: NewCourse,
    ) -> Result<Option<Course>, StoreError> {
        let mut tables = self.write()?;
        check_course(&tables, Some(id), &course)?;

        Ok(tables.courses.iter_mut().find(|c| c.id == id).map(|row| {
            row.slug = course.slug;
            row.title = course.title;
            row.level = course.level;
            row.description = course.description;
            row.duration_hours = course.duration_hours;
            row.max_students = course.max_students;
            row.is_active = course.is_active;
            row.clone()
        }))
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let before = tables.courses.len();
        tables.courses.retain(|c| c.id != id);
        if tables.courses.len() == before {
            return Ok(false);
        }

        let removed: Vec<Uuid> = tables
            .schedules
            .iter()
            .filter(|s| s.course_id == id)
            .map(|s| s.id)
            .collect();
        tables.schedules.retain(|s| s.course_id != id);
        for lead in tables.leads.iter_mut() {
            if lead.course_id == Some(id) {
                lead.course_id = None;
            }
            if lead.schedule_id.is_some_and(|s| removed.contains(&s)) {
                lead.schedule_id = None;
            }
        }
        Ok(true)
    }

    async fn list_schedules(&self) -> Result<Vec<ScheduleView>, StoreError> {
        let tables = self.read()?;
        let mut views: Vec<ScheduleView> = tables
            .schedules
            .iter()
            .map(|s| ScheduleView {
                schedule: s.clone(),
                course_title: course_title(&tables, s.course_id).map(str::to_string),
            })
            .collect();
        views.sort_by_key(|v| v.schedule.start_date);
        Ok(views)
    }

    async fn insert_schedule(&self, schedule: NewSchedule) -> Result<Schedule, StoreError> {
        let mut tables = self.write()?;
        check_schedule(&tables, &schedule)?;

        let row = Schedule {
            id: Uuid::new_v4(),
            course_id: schedule.course_id,
            start_date: schedule.start_date,
            end_date: schedule.end_date,
            location: schedule.location,
            max_students: schedule.max_students,
            enrolled_count: 0,
            status: schedule.status.as_str().to_string(),
            notes: schedule.notes,
        };
        tables.schedules.push(row.clone());
        Ok(row)
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        schedule: NewSchedule,
    ) -> Result<Option<Schedule>, StoreError> {
        let mut tables = self.write()?;
        check_schedule(&tables, &schedule)?;

        Ok(tables.schedules.iter_mut().find(|s| s.id == id).map(|row| {
            row.course_id = schedule.course_id;
            row.start_date = schedule.start_date;
            row.end_date = schedule.end_date;
            row.location = schedule.location;
            row.max_students = schedule.max_students;
            row.status = schedule.status.as_str().to_string();
            row.notes = schedule.notes;
            row.clone()
        }))
    }

    async fn delete_schedule(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let before = tables.schedules.len();
        tables.schedules.retain(|s| s.id != id);
        if tables.schedules.len() == before {
            return Ok(false);
        }
        for lead in tables.leads.iter_mut() {
            if lead.schedule_id == Some(id) {
                lead.schedule_id = None;
            }
        }
        Ok(true)
    }

    async fn get_site_settings(&self) -> Result<Option<SiteSettings>, StoreError> {
        let tables = self.read()?;
        Ok(tables.settings.clone())
    }

    async fn save_site_settings(&self, settings: SiteSettings) -> Result<SiteSettings, StoreError> {
        let mut tables = self.write()?;
        tables.settings = Some(settings.clone());
        Ok(settings)
    }

    async fn user_for_token(&self, token_sha256: &str) -> Result<Option<Uuid>, StoreError> {
        let tables = self.read()?;
        Ok(tables.tokens.get(token_sha256).copied())
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<AppRole>, StoreError> {
        let tables = self.read()?;
        Ok(tables.roles.get(&user_id).cloned().unwrap_or_default())
    }

    async fn revoke_token(&self, token_sha256: &str) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        Ok(tables.tokens.remove(token_sha256).is_some())
    }
}
