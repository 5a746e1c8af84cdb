/// Integration tests with a mocked e-mail provider
/// Exercises the notification dispatcher without hitting the real service
use chrono::{NaiveDate, TimeZone, Utc};
use gtactical_leads_api::config::Config;
use gtactical_leads_api::errors::DispatchError;
use gtactical_leads_api::models::{Lead, LeadStatus, NotifyRequest};
use gtactical_leads_api::notify::{render_body, NotificationDispatcher};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(resend_base_url: String) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 3000,
        run_migrations: false,
        resend_api_key: "test_key".to_string(),
        resend_base_url,
        notify_email: "equipe@gtactical.com.br".to_string(),
        from_email: "G-Tactical <no-reply@gtactical.com.br>".to_string(),
        dispatch_queue_capacity: 16,
        admin_page_size: 500,
        display_utc_offset_hours: -3,
        session_ttl_secs: 60,
    }
}

fn sample_lead() -> Lead {
    let created = Utc.with_ymd_and_hms(2026, 10, 18, 13, 5, 0).unwrap();
    Lead {
        id: Uuid::new_v4(),
        course_id: Some(Uuid::new_v4()),
        schedule_id: None,
        full_name: "Maria Silva".to_string(),
        birth_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        cpf: "52998224725".to_string(),
        phone: "41999998888".to_string(),
        email: "maria@example.com".to_string(),
        city: "Curitiba".to_string(),
        state: "PR".to_string(),
        observations: Some("Tenho porte funcional".to_string()),
        terms_accepted: true,
        recording_authorized: true,
        status: LeadStatus::Novo,
        source: "website".to_string(),
        user_agent: Some("Mozilla/5.0".to_string()),
        ip_address: Some("203.0.113.7".to_string()),
        created_at: created,
        updated_at: created,
    }
}

#[tokio::test]
async fn test_dispatch_posts_plain_text_email() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("Authorization", "Bearer test_key"))
        .and(body_partial_json(serde_json::json!({
            "from": "G-Tactical <no-reply@gtactical.com.br>",
            "to": ["equipe@gtactical.com.br"],
            "subject": "Nova inscrição – Maria Silva (Curitiba/PR)"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "em_1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let dispatcher = NotificationDispatcher::from_config(&config).unwrap();
    let lead = sample_lead();

    dispatcher.dispatch(&lead).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["text"], render_body(&lead));
    assert!(body["text"]
        .as_str()
        .unwrap()
        .contains("Status: novo | Origem: website"));
}

#[tokio::test]
async fn test_provider_error_carries_status_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let dispatcher = NotificationDispatcher::from_config(&config).unwrap();

    match dispatcher.dispatch(&sample_lead()).await {
        Err(DispatchError::ProviderError { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("expected ProviderError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_record_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let dispatcher = NotificationDispatcher::from_config(&config).unwrap();

    let result = dispatcher.dispatch_request(NotifyRequest { record: None }).await;
    assert!(matches!(result, Err(DispatchError::MissingPayload)));
}

#[tokio::test]
async fn test_dispatch_is_not_idempotent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let dispatcher = NotificationDispatcher::from_config(&config).unwrap();
    let lead = sample_lead();

    dispatcher.dispatch(&lead).await.unwrap();
    dispatcher
        .dispatch_request(NotifyRequest { record: Some(lead) })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_open_circuit_fails_fast_without_calling_provider() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let dispatcher = NotificationDispatcher::from_config(&config).unwrap();
    let lead = sample_lead();

    for _ in 0..5 {
        assert!(matches!(
            dispatcher.dispatch(&lead).await,
            Err(DispatchError::ProviderError { status: 503, .. })
        ));
    }

    assert!(matches!(
        dispatcher.dispatch(&lead).await,
        Err(DispatchError::ProviderUnavailable)
    ));
}
