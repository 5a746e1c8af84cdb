//! Staff review of captured leads: listing, status changes, CSV export,
//! dashboard figures and the WhatsApp contact link.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::StaffSession;
use crate::errors::{LoadError, UpdateError};
use crate::models::{LeadStatus, LeadView};
use crate::store::LeadStore;
use crate::validation::digits_only;

/// Header row of the lead export, in column order.
pub const CSV_HEADERS: [&str; 7] = ["Nome", "Curso", "Turma", "Status", "Data", "Email", "Telefone"];

const WEEKDAY_LABELS: [&str; 7] = ["Dom", "Seg", "Ter", "Qua", "Qui", "Sex", "Sáb"];

const RECENT_LEADS: i64 = 5;
const CHART_DAYS: i64 = 7;

// ============ Dashboard Models ============

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_leads_30d: i64,
    pub total_leads_all: i64,
    pub active_courses: i64,
}

/// Submissions on one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub day: String,
    pub inscricoes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub chart: Vec<ChartPoint>,
    pub recent_leads: Vec<LeadView>,
}

// ============ Workspace ============

#[derive(Clone)]
pub struct AdminWorkspace {
    store: Arc<dyn LeadStore>,
    page_size: i64,
    display_offset: FixedOffset,
}

impl AdminWorkspace {
    pub fn new(store: Arc<dyn LeadStore>, page_size: i64, display_offset: FixedOffset) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            display_offset,
        }
    }

    /// Newest-first page of leads, optionally filtered by name or course title.
    ///
    /// Every call re-reads the store; nothing is cached between calls.
    pub async fn list(
        &self,
        session: &StaffSession,
        filter: Option<&str>,
    ) -> Result<Vec<LeadView>, LoadError> {
        let views = self.store.list_lead_views(self.page_size).await?;
        let views = filter_views(views, filter);

        tracing::debug!(
            "User {} listed {} leads (filter: {:?})",
            session.user_id(),
            views.len(),
            filter
        );
        Ok(views)
    }

    pub async fn view(
        &self,
        _session: &StaffSession,
        id: Uuid,
    ) -> Result<Option<LeadView>, LoadError> {
        Ok(self.store.get_lead_view(id).await?)
    }

    /// Sets the status of a lead. Any status may follow any other.
    ///
    /// # Returns
    ///
    /// The lead as re-read after the write, so callers never show a state
    /// the store did not confirm.
    pub async fn set_status(
        &self,
        session: &StaffSession,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<LeadView, UpdateError> {
        if !self.store.update_lead_status(id, status).await? {
            return Err(UpdateError::NotFound(id));
        }

        let view = self
            .store
            .get_lead_view(id)
            .await?
            .ok_or(UpdateError::NotFound(id))?;

        tracing::info!(
            "✓ Lead {} set to '{}' by {:?} {}",
            id,
            status,
            session.role(),
            session.user_id()
        );
        Ok(view)
    }

    /// CSV bytes for `views`, using this workspace's display offset.
    pub fn export_csv(&self, views: &[LeadView]) -> Result<Vec<u8>, csv::Error> {
        export_csv(views, self.display_offset)
    }

    pub async fn dashboard(&self, session: &StaffSession) -> Result<Dashboard, LoadError> {
        self.dashboard_at(session, Utc::now()).await
    }

    /// Dashboard figures as of `now`.
    pub async fn dashboard_at(
        &self,
        session: &StaffSession,
        now: DateTime<Utc>,
    ) -> Result<Dashboard, LoadError> {
        let total_leads_30d = self
            .store
            .count_leads(Some(now - Duration::days(30)))
            .await?;
        let total_leads_all = self.store.count_leads(None).await?;
        let active_courses = self.store.count_active_courses().await?;

        let first_day = now.date_naive() - Duration::days(CHART_DAYS - 1);
        let since = Utc.from_utc_datetime(&first_day.and_time(NaiveTime::MIN));
        let stamps = self.store.lead_created_since(since).await?;
        let chart = daily_histogram(first_day, &stamps);

        let recent_leads = self.store.list_lead_views(RECENT_LEADS).await?;

        tracing::debug!("Dashboard built for {}", session.user_id());
        Ok(Dashboard {
            stats: DashboardStats {
                total_leads_30d,
                total_leads_all,
                active_courses,
            },
            chart,
            recent_leads,
        })
    }
}

/// Case-insensitive substring match over the lead name and course title.
/// A blank query keeps everything.
pub fn filter_views(views: Vec<LeadView>, query: Option<&str>) -> Vec<LeadView> {
    let needle = match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => q.to_lowercase(),
        None => return views,
    };

    views
        .into_iter()
        .filter(|view| {
            view.lead.full_name.to_lowercase().contains(&needle)
                || view
                    .course_title
                    .as_deref()
                    .is_some_and(|title| title.to_lowercase().contains(&needle))
        })
        .collect()
}

fn display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Renders the export table. Every field is quoted, embedded quotes are
/// doubled, rows are separated by `\n` with none after the last, and there
/// is no BOM.
pub fn export_csv(views: &[LeadView], offset: FixedOffset) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADERS)?;
    for view in views {
        let lead = &view.lead;
        writer.write_record([
            lead.full_name.clone(),
            view.course_title.clone().unwrap_or_default(),
            view.schedule_date.map(display_date).unwrap_or_default(),
            lead.status.to_string(),
            display_date(lead.created_at.with_timezone(&offset).date_naive()),
            lead.email.clone(),
            lead.phone.clone(),
        ])?;
    }

    let mut bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    Ok(bytes)
}

/// `leads_<YYYY-MM-DD>.csv`
pub fn csv_filename(today: NaiveDate) -> String {
    format!("leads_{}.csv", today.format("%Y-%m-%d"))
}

/// One point per UTC day starting at `first_day`, zero-filled.
pub fn daily_histogram(first_day: NaiveDate, stamps: &[DateTime<Utc>]) -> Vec<ChartPoint> {
    let days: Vec<NaiveDate> = (0..CHART_DAYS)
        .map(|i| first_day + Duration::days(i))
        .collect();

    let mut buckets: BTreeMap<NaiveDate, i64> = days.iter().map(|d| (*d, 0)).collect();
    for stamp in stamps {
        if let Some(count) = buckets.get_mut(&stamp.date_naive()) {
            *count += 1;
        }
    }

    days.into_iter()
        .map(|date| ChartPoint {
            date,
            day: WEEKDAY_LABELS[date.weekday().num_days_from_sunday() as usize].to_string(),
            inscricoes: buckets.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

/// Opens a WhatsApp chat with the lead, pre-filled with a greeting.
pub fn whatsapp_link(view: &LeadView) -> Result<url::Url, url::ParseError> {
    let phone = digits_only(&view.lead.phone);
    let message = format!(
        "Olá {}, aqui é da G-TACTICAL sobre sua inscrição no curso {} ({}).",
        view.lead.full_name,
        view.course_title.as_deref().unwrap_or(""),
        view.schedule_date.map(display_date).unwrap_or_default()
    );

    url::Url::parse_with_params(&format!("https://wa.me/55{}", phone), &[("text", message)])
}
