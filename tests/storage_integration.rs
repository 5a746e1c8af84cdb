use std::env;
use uuid::Uuid;

use gtactical_leads_api::db::Database;
use gtactical_leads_api::models::{LeadStatus, NewCourse, NewLead, NewSchedule, ScheduleStatus};
use gtactical_leads_api::store::{LeadStore, PgLeadStore};

/// Integration smoke test for the Postgres lead store.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn lead_round_trip_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    db.migrate().await?;
    let store = PgLeadStore::new(db.pool.clone());

    let before = store.count_leads(None).await?;

    let lead = store
        .insert_lead(NewLead {
            course_id: None,
            schedule_id: None,
            full_name: format!("Smoke Test {}", Uuid::new_v4()),
            birth_date: chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            cpf: "52998224725".to_string(),
            phone: "41999998888".to_string(),
            email: "smoke@example.com".to_string(),
            city: "Curitiba".to_string(),
            state: "PR".to_string(),
            observations: None,
            terms_accepted: true,
            recording_authorized: false,
            status: LeadStatus::Novo,
            source: "website".to_string(),
            user_agent: Some("smoke-test".to_string()),
            ip_address: None,
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    assert_ne!(lead.id, Uuid::nil());
    assert_eq!(store.count_leads(None).await?, before + 1);

    assert!(store.update_lead_status(lead.id, LeadStatus::Contatado).await?);
    let view = store
        .get_lead_view(lead.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("inserted lead not found"))?;
    assert_eq!(view.lead.status, LeadStatus::Contatado);
    assert!(view.lead.updated_at >= view.lead.created_at);
    assert!(view.course_title.is_none());

    // The CHECK on state rejects lower-case UFs.
    let mut bad = NewLead {
        state: "pr".to_string(),
        ..sample(&lead)
    };
    bad.full_name = "Rejected".to_string();
    assert!(store.insert_lead(bad).await.is_err());

    sqlx::query("DELETE FROM leads WHERE id = $1")
        .bind(lead.id)
        .execute(&db.pool)
        .await?;

    // Catalog writes: the slug is unique and updates keep the enrolment count.
    let slug = format!("smoke-{}", Uuid::new_v4());
    let course = store
        .insert_course(NewCourse {
            slug: slug.clone(),
            title: "Smoke Course".to_string(),
            level: "iniciante".to_string(),
            description: "Smoke".to_string(),
            duration_hours: 8,
            max_students: 12,
            is_active: false,
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(store
        .insert_course(NewCourse {
            slug,
            title: "Duplicate".to_string(),
            level: "iniciante".to_string(),
            description: "Smoke".to_string(),
            duration_hours: 8,
            max_students: 12,
            is_active: false,
        })
        .await
        .is_err());

    let start = chrono::NaiveDate::from_ymd_opt(2030, 1, 5).unwrap();
    let schedule = store
        .insert_schedule(NewSchedule {
            course_id: course.id,
            start_date: start,
            end_date: None,
            location: "Smoke".to_string(),
            max_students: 12,
            status: ScheduleStatus::Aberto,
            notes: None,
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    sqlx::query("UPDATE schedules SET enrolled_count = 4 WHERE id = $1")
        .bind(schedule.id)
        .execute(&db.pool)
        .await?;
    let updated = store
        .update_schedule(
            schedule.id,
            NewSchedule {
                course_id: course.id,
                start_date: start,
                end_date: Some(start),
                location: "Smoke".to_string(),
                max_students: 20,
                status: ScheduleStatus::Concluido,
                notes: Some("updated".to_string()),
            },
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("schedule vanished"))?;
    assert_eq!(updated.enrolled_count, 4);
    assert_eq!(updated.status, "concluido");

    assert!(store
        .delete_course(course.id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?);

    Ok(())
}

fn sample(lead: &gtactical_leads_api::models::Lead) -> NewLead {
    NewLead {
        course_id: lead.course_id,
        schedule_id: lead.schedule_id,
        full_name: lead.full_name.clone(),
        birth_date: lead.birth_date,
        cpf: lead.cpf.clone(),
        phone: lead.phone.clone(),
        email: lead.email.clone(),
        city: lead.city.clone(),
        state: lead.state.clone(),
        observations: lead.observations.clone(),
        terms_accepted: lead.terms_accepted,
        recording_authorized: lead.recording_authorized,
        status: lead.status,
        source: lead.source.clone(),
        user_agent: lead.user_agent.clone(),
        ip_address: lead.ip_address.clone(),
    }
}
