use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Database Models ============

/// Review status of a lead. Stored and exchanged verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "lead_status", rename_all = "lowercase")]
pub enum LeadStatus {
    /// Just submitted, nobody has reached out yet.
    Novo,
    /// Staff contacted the student.
    Contatado,
    /// Seat confirmed.
    Confirmado,
    Cancelado,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 4] = [
        LeadStatus::Novo,
        LeadStatus::Contatado,
        LeadStatus::Confirmado,
        LeadStatus::Cancelado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Novo => "novo",
            LeadStatus::Contatado => "contatado",
            LeadStatus::Confirmado => "confirmado",
            LeadStatus::Cancelado => "cancelado",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "novo" => Ok(LeadStatus::Novo),
            "contatado" => Ok(LeadStatus::Contatado),
            "confirmado" => Ok(LeadStatus::Confirmado),
            "cancelado" => Ok(LeadStatus::Cancelado),
            other => Err(format!(
                "unknown status '{}', expected one of novo|contatado|confirmado|cancelado",
                other
            )),
        }
    }
}

/// A prospective student's registration, as persisted.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub course_id: Option<Uuid>,
    pub schedule_id: Option<Uuid>,
    pub full_name: String,
    pub birth_date: NaiveDate,
    /// 11 digits, no punctuation.
    pub cpf: String,
    /// 10 or 11 digits, area code included.
    pub phone: String,
    pub email: String,
    pub city: String,
    /// Two uppercase letters (UF).
    pub state: String,
    pub observations: Option<String>,
    pub terms_accepted: bool,
    pub recording_authorized: bool,
    pub status: LeadStatus,
    pub source: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized lead handed to the store for the single insert.
/// The store assigns `id`, `created_at` and `updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub course_id: Option<Uuid>,
    pub schedule_id: Option<Uuid>,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub cpf: String,
    pub phone: String,
    pub email: String,
    pub city: String,
    pub state: String,
    pub observations: Option<String>,
    pub terms_accepted: bool,
    pub recording_authorized: bool,
    pub status: LeadStatus,
    pub source: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// A course offered by the school.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub level: String,
    pub description: String,
    pub duration_hours: i32,
    pub max_students: i32,
    pub is_active: bool,
}

/// A concrete offering of a course. `enrolled_count` is maintained elsewhere.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub course_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub location: String,
    pub max_students: i32,
    pub enrolled_count: i32,
    pub status: String,
    pub notes: Option<String>,
}

/// Lifecycle of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "schedule_status", rename_all = "snake_case")]
pub enum ScheduleStatus {
    Aberto,
    EmAndamento,
    Concluido,
    Cancelado,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Aberto => "aberto",
            ScheduleStatus::EmAndamento => "em_andamento",
            ScheduleStatus::Concluido => "concluido",
            ScheduleStatus::Cancelado => "cancelado",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aberto" => Ok(ScheduleStatus::Aberto),
            "em_andamento" => Ok(ScheduleStatus::EmAndamento),
            "concluido" => Ok(ScheduleStatus::Concluido),
            "cancelado" => Ok(ScheduleStatus::Cancelado),
            other => Err(format!("unknown schedule status '{}'", other)),
        }
    }
}

/// Validated course fields, written as a whole on create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCourse {
    pub slug: String,
    pub title: String,
    pub level: String,
    pub description: String,
    pub duration_hours: i32,
    pub max_students: i32,
    pub is_active: bool,
}

/// Validated schedule fields. The enrolment counter is not among them.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSchedule {
    pub course_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub location: String,
    pub max_students: i32,
    pub status: ScheduleStatus,
    pub notes: Option<String>,
}

/// Public site settings, kept in a single row.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SiteSettings {
    pub site_name: String,
    pub contact_email: String,
    pub whatsapp: String,
    pub maps_url: String,
    pub notify_email: String,
    pub notify_new_lead: bool,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "G-TACTICAL".to_string(),
            contact_email: "contato@g-tactical.com.br".to_string(),
            whatsapp: "(43) 99999-0000".to_string(),
            maps_url: "https://maps.google.com/?q=Clube+de+Tiro+Massada,+Imba%C3%BA,+PR"
                .to_string(),
            notify_email: "contato@g-tactical.com.br".to_string(),
            notify_new_lead: true,
        }
    }
}

// ============ View Models ============

/// A lead joined with the display data of its course and schedule.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct LeadView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lead: Lead,
    pub course_title: Option<String>,
    pub schedule_date: Option<NaiveDate>,
    pub schedule_location: Option<String>,
}

/// A schedule with its course title, as listed to staff.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ScheduleView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub schedule: Schedule,
    pub course_title: Option<String>,
}

/// An open schedule as offered in the public form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOption {
    pub id: Uuid,
    pub course_id: Uuid,
    pub course_title: String,
    pub start_date: NaiveDate,
    pub location: String,
    pub available_slots: i32,
    pub total_slots: i32,
}

impl ScheduleOption {
    pub fn from_schedule(schedule: &Schedule, course_title: Option<&str>) -> Self {
        Self {
            id: schedule.id,
            course_id: schedule.course_id,
            course_title: course_title.unwrap_or("Curso").to_string(),
            start_date: schedule.start_date,
            location: schedule.location.clone(),
            available_slots: (schedule.max_students - schedule.enrolled_count).max(0),
            total_slots: schedule.max_students.max(0),
        }
    }
}

// ============ API Request/Response Models ============

/// Lead creation payload sent by the public form.
///
/// `status` and `source` may be present on the wire but are always fixed
/// by the service, so they are not modelled here.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LeadInput {
    #[serde(default)]
    pub course_id: Option<Uuid>,
    #[serde(default)]
    pub schedule_id: Option<Uuid>,
    #[serde(default)]
    pub full_name: String,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub birth_date: String,
    #[serde(default)]
    pub cpf: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub terms_accepted: bool,
    #[serde(default)]
    pub recording_authorized: bool,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Request metadata observed at the transport layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Response for a successful submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub success: bool,
    pub lead_id: Uuid,
    pub message: String,
}

/// Body of a notification dispatcher invocation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifyRequest {
    #[serde(default)]
    pub record: Option<Lead>,
}

/// Body of an admin status change.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: LeadStatus,
}

/// Course create/update payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CourseInput {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_course_level")]
    pub level: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration_hours: i32,
    #[serde(default)]
    pub max_students: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_course_level() -> String {
    "iniciante".to_string()
}

fn default_true() -> bool {
    true
}

/// Schedule create/update payload.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScheduleInput {
    #[serde(default)]
    pub course_id: Option<Uuid>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub location: String,
    /// Defaults to 12 seats.
    #[serde(default)]
    pub max_students: Option<i32>,
    /// Defaults to `aberto`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `?q=` filter for the admin lead list and export.
#[derive(Debug, Default, Deserialize)]
pub struct LeadListQuery {
    #[serde(default)]
    pub q: Option<String>,
}
