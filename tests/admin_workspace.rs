/// Admin review workspace tests
/// Listing, filtering, CSV export and dashboard figures over the in-memory store
use chrono::{Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use gtactical_leads_api::admin::{export_csv, AdminWorkspace};
use gtactical_leads_api::auth::{AdminSession, AppRole, StaffSession};
use gtactical_leads_api::errors::UpdateError;
use gtactical_leads_api::models::{LeadStatus, NewLead};
use gtactical_leads_api::store::{LeadStore, MemoryLeadStore};
use std::sync::Arc;
use uuid::Uuid;

fn brasilia() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap()
}

fn staff(role: AppRole) -> StaffSession {
    AdminSession {
        user_id: Uuid::new_v4(),
        role: Some(role),
    }
    .staff()
    .unwrap()
}

fn new_lead(name: &str, course_id: Option<Uuid>, schedule_id: Option<Uuid>) -> NewLead {
    NewLead {
        course_id,
        schedule_id,
        full_name: name.to_string(),
        birth_date: NaiveDate::from_ymd_opt(1988, 7, 14).unwrap(),
        cpf: "52998224725".to_string(),
        phone: "41999998888".to_string(),
        email: "lead@example.com".to_string(),
        city: "Curitiba".to_string(),
        state: "PR".to_string(),
        observations: None,
        terms_accepted: true,
        recording_authorized: false,
        status: LeadStatus::Novo,
        source: "website".to_string(),
        user_agent: None,
        ip_address: None,
    }
}

#[tokio::test]
async fn test_export_quotes_commas_and_doubles_quotes() {
    let store = Arc::new(MemoryLeadStore::new());
    let course = store.add_course("Tiro Defensivo", true);
    let schedule = store.add_schedule(
        course.id,
        NaiveDate::from_ymd_opt(2026, 12, 5).unwrap(),
        "Curitiba",
        12,
        0,
        "aberto",
    );

    let first = store
        .insert_lead(new_lead("O'Brien, Jr.", Some(course.id), Some(schedule.id)))
        .await
        .unwrap();
    let second = store
        .insert_lead(new_lead("Carlos \"Tigre\" Souza", None, None))
        .await
        .unwrap();
    store.set_created_at(first.id, Utc.with_ymd_and_hms(2026, 10, 17, 15, 0, 0).unwrap());
    store.set_created_at(second.id, Utc.with_ymd_and_hms(2026, 10, 16, 15, 0, 0).unwrap());

    let workspace = AdminWorkspace::new(store.clone(), 500, brasilia());
    let views = workspace.list(&staff(AppRole::Admin), None).await.unwrap();
    let bytes = workspace.export_csv(&views).unwrap();
    let text = String::from_utf8(bytes.clone()).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "\"Nome\",\"Curso\",\"Turma\",\"Status\",\"Data\",\"Email\",\"Telefone\""
    );
    assert_eq!(
        lines[1],
        "\"O'Brien, Jr.\",\"Tiro Defensivo\",\"05/12/2026\",\"novo\",\"17/10/2026\",\"lead@example.com\",\"41999998888\""
    );
    assert_eq!(
        lines[2],
        "\"Carlos \"\"Tigre\"\" Souza\",\"\",\"\",\"novo\",\"16/10/2026\",\"lead@example.com\",\"41999998888\""
    );
    assert!(!text.starts_with('\u{feff}'));
    assert!(!text.contains('\r'));
    assert_eq!(lines.len(), 3);
    assert!(!text.ends_with('\n'));

    // Every record still has seven columns when read back.
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    for record in reader.records() {
        assert_eq!(record.unwrap().len(), 7);
    }
}

#[tokio::test]
async fn test_export_of_nothing_is_just_the_header() {
    let bytes = export_csv(&[], brasilia()).unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "\"Nome\",\"Curso\",\"Turma\",\"Status\",\"Data\",\"Email\",\"Telefone\""
    );
}

#[tokio::test]
async fn test_list_filters_on_name_and_course_title() {
    let store = Arc::new(MemoryLeadStore::new());
    let pistola = store.add_course("Pistola Básico", true);
    store
        .insert_lead(new_lead("Maria Silva", None, None))
        .await
        .unwrap();
    store
        .insert_lead(new_lead("João Souza", Some(pistola.id), None))
        .await
        .unwrap();

    let workspace = AdminWorkspace::new(store, 500, brasilia());
    let session = staff(AppRole::Moderator);

    let all = workspace.list(&session, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let by_course = workspace.list(&session, Some("PISTOLA")).await.unwrap();
    assert_eq!(by_course.len(), 1);
    assert_eq!(by_course[0].lead.full_name, "João Souza");

    let by_name = workspace.list(&session, Some("silva")).await.unwrap();
    assert_eq!(by_name.len(), 1);

    assert!(workspace.list(&session, Some("nobody")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_respects_page_size() {
    let store = Arc::new(MemoryLeadStore::new());
    for i in 0..4 {
        store
            .insert_lead(new_lead(&format!("Aluno {i}"), None, None))
            .await
            .unwrap();
    }

    let workspace = AdminWorkspace::new(store, 3, brasilia());
    let views = workspace.list(&staff(AppRole::Admin), None).await.unwrap();
    assert_eq!(views.len(), 3);
}

#[tokio::test]
async fn test_read_failure_surfaces_load_error() {
    let store = Arc::new(MemoryLeadStore::new());
    store.set_fail_reads(true);

    let workspace = AdminWorkspace::new(store, 500, brasilia());
    assert!(workspace.list(&staff(AppRole::Admin), None).await.is_err());
}

#[tokio::test]
async fn test_status_update_of_unknown_lead() {
    let store = Arc::new(MemoryLeadStore::new());
    let workspace = AdminWorkspace::new(store, 500, brasilia());
    let id = Uuid::new_v4();

    let result = workspace
        .set_status(&staff(AppRole::Admin), id, LeadStatus::Contatado)
        .await;
    assert!(matches!(result, Err(UpdateError::NotFound(missing)) if missing == id));
}

#[tokio::test]
async fn test_failed_status_write_keeps_prior_status() {
    let store = Arc::new(MemoryLeadStore::new());
    let lead = store
        .insert_lead(new_lead("Maria Silva", None, None))
        .await
        .unwrap();
    store.set_fail_writes(true);

    let workspace = AdminWorkspace::new(store.clone(), 500, brasilia());
    let session = staff(AppRole::Admin);
    let result = workspace
        .set_status(&session, lead.id, LeadStatus::Cancelado)
        .await;
    assert!(matches!(result, Err(UpdateError::Store(_))));

    let views = workspace.list(&session, None).await.unwrap();
    assert_eq!(views[0].lead.status, LeadStatus::Novo);
}

#[tokio::test]
async fn test_dashboard_counts_and_histogram() {
    let store = Arc::new(MemoryLeadStore::new());
    store.add_course("Tiro Defensivo", true);
    store.add_course("Curso Antigo", false);

    let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
    let stamps = [
        now - Duration::hours(1),  // today
        now - Duration::days(1),   // yesterday
        now - Duration::days(1),   // yesterday
        now - Duration::days(10),  // inside 30 days, outside the chart
        now - Duration::days(45),  // only in the all-time total
    ];
    for (i, stamp) in stamps.iter().enumerate() {
        let lead = store
            .insert_lead(new_lead(&format!("Aluno {i}"), None, None))
            .await
            .unwrap();
        store.set_created_at(lead.id, *stamp);
    }

    let workspace = AdminWorkspace::new(store, 500, brasilia());
    let dashboard = workspace
        .dashboard_at(&staff(AppRole::Admin), now)
        .await
        .unwrap();

    assert_eq!(dashboard.stats.total_leads_30d, 4);
    assert_eq!(dashboard.stats.total_leads_all, 5);
    assert_eq!(dashboard.stats.active_courses, 1);

    assert_eq!(dashboard.chart.len(), 7);
    assert_eq!(
        dashboard.chart[0].date,
        NaiveDate::from_ymd_opt(2026, 10, 12).unwrap()
    );
    // 2026-10-18 is a Sunday.
    assert_eq!(dashboard.chart[6].day, "Dom");
    assert_eq!(dashboard.chart[6].inscricoes, 1);
    assert_eq!(dashboard.chart[5].inscricoes, 2);
    assert_eq!(
        dashboard.chart.iter().map(|p| p.inscricoes).sum::<i64>(),
        3
    );

    assert_eq!(dashboard.recent_leads.len(), 5);
    assert_eq!(dashboard.recent_leads[0].lead.full_name, "Aluno 0");
}
