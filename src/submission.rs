use chrono::{Local, NaiveDate};
use std::sync::Arc;

use crate::dispatch_queue::DispatchQueue;
use crate::errors::{FieldErrors, SubmissionError};
use crate::models::{CaptureMetadata, Lead, LeadInput, LeadStatus, NewLead};
use crate::store::LeadStore;
use crate::validation::{digits_only, parse_birth_date, sanitize_input, validate_lead_input};

/// Origin recorded on every lead created through this service.
pub const LEAD_SOURCE: &str = "website";

/// Longest user agent kept with a lead, in characters.
pub const MAX_USER_AGENT_CHARS: usize = 512;

/// Trimmed and cut to [`MAX_USER_AGENT_CHARS`]; `None` when blank.
pub fn clip_user_agent(raw: &str) -> Option<String> {
    let ua = raw.trim();
    (!ua.is_empty()).then(|| ua.chars().take(MAX_USER_AGENT_CHARS).collect())
}

/// Accepts public registrations: re-validates, stores once, then queues the
/// staff notification.
#[derive(Clone)]
pub struct LeadSubmissionService {
    store: Arc<dyn LeadStore>,
    queue: DispatchQueue,
}

impl LeadSubmissionService {
    pub fn new(store: Arc<dyn LeadStore>, queue: DispatchQueue) -> Self {
        Self { store, queue }
    }

    /// Submits a lead, validating against today's local date.
    pub async fn submit(
        &self,
        input: LeadInput,
        meta: CaptureMetadata,
    ) -> Result<Lead, SubmissionError> {
        self.submit_on(input, meta, Local::now().date_naive()).await
    }

    /// Submits a lead as of `today`.
    ///
    /// # Returns
    ///
    /// The stored row, with server-assigned id and timestamps. The
    /// notification is queued only after the insert succeeded and its
    /// outcome never affects the result.
    pub async fn submit_on(
        &self,
        input: LeadInput,
        meta: CaptureMetadata,
        today: NaiveDate,
    ) -> Result<Lead, SubmissionError> {
        validate_lead_input(&input, today).map_err(|errors| {
            tracing::warn!("⚠️  Lead rejected by validation: {}", errors);
            SubmissionError::ValidationFailed(errors)
        })?;

        let new_lead = normalize(input, meta)?;

        // Phase 1: the single durable write.
        let lead = self
            .store
            .insert_lead(new_lead)
            .await
            .map_err(SubmissionError::PersistenceError)?;

        tracing::info!(
            "✓ Lead {} stored ({}/{})",
            lead.id,
            lead.city,
            lead.state
        );

        // Phase 2: fire-and-forget.
        self.queue.enqueue(lead.clone());

        Ok(lead)
    }
}

/// Turns a validated payload into the row to insert.
pub fn normalize(input: LeadInput, meta: CaptureMetadata) -> Result<NewLead, SubmissionError> {
    let birth_date = parse_birth_date(&input.birth_date).ok_or_else(|| {
        let mut errors = FieldErrors::new();
        errors.add("birth_date", "Data de nascimento inválida");
        SubmissionError::ValidationFailed(errors)
    })?;

    let observations = input
        .observations
        .as_deref()
        .map(sanitize_input)
        .filter(|o| !o.is_empty());

    let user_agent = input
        .user_agent
        .as_deref()
        .and_then(clip_user_agent)
        .or(meta.user_agent);

    Ok(NewLead {
        course_id: input.course_id,
        schedule_id: input.schedule_id,
        full_name: sanitize_input(&input.full_name),
        birth_date,
        cpf: digits_only(&input.cpf),
        phone: digits_only(&input.phone),
        email: sanitize_input(&input.email).to_lowercase(),
        city: sanitize_input(&input.city),
        state: sanitize_input(&input.state).to_uppercase(),
        observations,
        terms_accepted: input.terms_accepted,
        recording_authorized: input.recording_authorized,
        status: LeadStatus::Novo,
        source: LEAD_SOURCE.to_string(),
        user_agent,
        ip_address: meta.ip_address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLeadStore;

    fn input() -> LeadInput {
        LeadInput {
            full_name: "  Maria   Silva ".to_string(),
            birth_date: "2000-01-01".to_string(),
            cpf: "529.982.247-25".to_string(),
            phone: "(41) 99999-8888".to_string(),
            email: "Maria@Example.com".to_string(),
            city: "Curitiba".to_string(),
            state: "pr".to_string(),
            observations: Some("   ".to_string()),
            terms_accepted: true,
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn test_normalize_strips_masks_and_fixes_case() {
        let lead = normalize(input(), CaptureMetadata::default()).unwrap();

        assert_eq!(lead.cpf, "52998224725");
        assert_eq!(lead.phone, "41999998888");
        assert_eq!(lead.email, "maria@example.com");
        assert_eq!(lead.state, "PR");
        assert_eq!(lead.observations, None);
        assert_eq!(lead.status, LeadStatus::Novo);
        assert_eq!(lead.source, "website");
    }

    #[test]
    fn test_payload_user_agent_wins_over_header() {
        let mut payload = input();
        payload.user_agent = Some("FormAgent/1.0".to_string());
        let meta = CaptureMetadata {
            user_agent: Some("HeaderAgent/2.0".to_string()),
            ip_address: Some("198.51.100.4".to_string()),
        };

        let lead = normalize(payload, meta.clone()).unwrap();
        assert_eq!(lead.user_agent.as_deref(), Some("FormAgent/1.0"));
        assert_eq!(lead.ip_address.as_deref(), Some("198.51.100.4"));

        let lead = normalize(input(), meta).unwrap();
        assert_eq!(lead.user_agent.as_deref(), Some("HeaderAgent/2.0"));
    }

    #[tokio::test]
    async fn test_store_failure_queues_nothing() {
        let store = Arc::new(MemoryLeadStore::new());
        store.set_fail_writes(true);
        let (queue, mut rx) = DispatchQueue::new(4);
        let service = LeadSubmissionService::new(store.clone(), queue);

        let result = service
            .submit_on(input(), CaptureMetadata::default(), today())
            .await;

        assert!(matches!(result, Err(SubmissionError::PersistenceError(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_underage_is_rejected_before_the_store() {
        let store = Arc::new(MemoryLeadStore::new());
        let (queue, mut rx) = DispatchQueue::new(4);
        let service = LeadSubmissionService::new(store.clone(), queue);

        let mut payload = input();
        payload.birth_date = "2010-06-01".to_string();
        let result = service
            .submit_on(payload, CaptureMetadata::default(), today())
            .await;

        match result {
            Err(SubmissionError::ValidationFailed(errors)) => {
                assert_eq!(errors.get("birth_date"), Some("Idade mínima: 18 anos"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert_eq!(store.insert_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_body_user_agent_is_clipped() {
        let mut long = input();
        long.user_agent = Some("x".repeat(10_000));
        let lead = normalize(long, CaptureMetadata::default()).unwrap();
        assert_eq!(
            lead.user_agent.map(|ua| ua.chars().count()),
            Some(MAX_USER_AGENT_CHARS)
        );

        let mut blank = input();
        blank.user_agent = Some("   ".to_string());
        let meta = CaptureMetadata {
            user_agent: Some("Mozilla/5.0".to_string()),
            ip_address: None,
        };
        let lead = normalize(blank, meta).unwrap();
        assert_eq!(lead.user_agent.as_deref(), Some("Mozilla/5.0"));
    }
}
