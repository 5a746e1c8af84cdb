//! New-lead notification: renders a plain-text summary and mails it to staff.
//!
//! The dispatcher keeps no state between calls. It is reached either from the
//! in-process dispatch worker or over HTTP at `/functions/lead-notify`.

use crate::config::Config;
use crate::email_client::{EmailClient, OutboundEmail};
use crate::errors::DispatchError;
use crate::models::{Lead, NotifyRequest};

const PLACEHOLDER: &str = "-";

/// `Nova inscrição – {full_name} ({city}/{state})`
pub fn render_subject(lead: &Lead) -> String {
    format!(
        "Nova inscrição – {} ({}/{})",
        lead.full_name, lead.city, lead.state
    )
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Sim"
    } else {
        "Não"
    }
}

fn or_placeholder(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(PLACEHOLDER)
}

/// Deterministic plain-text body, one field per line.
pub fn render_body(lead: &Lead) -> String {
    let course_id = lead.course_id.map(|id| id.to_string());
    let schedule_id = lead.schedule_id.map(|id| id.to_string());
    let observations = lead
        .observations
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or("Nenhuma");

    let lines = [
        format!("CURSO_ID: {}", or_placeholder(course_id.as_deref())),
        format!("TURMA_ID: {}", or_placeholder(schedule_id.as_deref())),
        String::new(),
        "DADOS DO ALUNO:".to_string(),
        format!("Nome: {}", lead.full_name),
        format!("Nascimento: {}", lead.birth_date.format("%Y-%m-%d")),
        format!("CPF: {}", lead.cpf),
        format!("Telefone: {}", lead.phone),
        format!("Email: {}", lead.email),
        format!("Cidade/UF: {}/{}", lead.city, lead.state),
        String::new(),
        "OBSERVAÇÕES:".to_string(),
        observations.to_string(),
        String::new(),
        "CONSENTIMENTOS:".to_string(),
        format!("Aceito Termos: {}", yes_no(lead.terms_accepted)),
        format!("Aceito Gravação: {}", yes_no(lead.recording_authorized)),
        String::new(),
        format!("Status: {} | Origem: {}", lead.status, lead.source),
        format!(
            "IP: {} | UA: {}",
            or_placeholder(lead.ip_address.as_deref()),
            or_placeholder(lead.user_agent.as_deref())
        ),
        format!("Data/Hora: {}", lead.created_at.to_rfc3339()),
    ];

    lines.join("\n")
}

/// Sends one staff notification per lead. Not idempotent: every call sends.
#[derive(Clone)]
pub struct NotificationDispatcher {
    client: EmailClient,
    from: String,
    to: String,
}

impl NotificationDispatcher {
    pub fn new(client: EmailClient, from: String, to: String) -> Self {
        Self { client, from, to }
    }

    pub fn from_config(config: &Config) -> Result<Self, DispatchError> {
        Ok(Self::new(
            EmailClient::from_config(config)?,
            config.from_email.clone(),
            config.notify_email.clone(),
        ))
    }

    pub fn compose(&self, lead: &Lead) -> OutboundEmail {
        OutboundEmail {
            from: self.from.clone(),
            to: vec![self.to.clone()],
            subject: render_subject(lead),
            text: render_body(lead),
        }
    }

    /// Sends the summary of `lead`. One attempt, no retry.
    pub async fn dispatch(&self, lead: &Lead) -> Result<(), DispatchError> {
        let email = self.compose(lead);
        match self.client.send(&email).await {
            Ok(()) => {
                tracing::info!(
                    "✓ Notification sent for lead {} ({}/{})",
                    lead.id,
                    lead.city,
                    lead.state
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("❌ Notification for lead {} failed: {}", lead.id, e);
                Err(e)
            }
        }
    }

    /// Entry point for `{ "record": Lead }` invocations.
    pub async fn dispatch_request(&self, request: NotifyRequest) -> Result<(), DispatchError> {
        let lead = request.record.ok_or(DispatchError::MissingPayload)?;
        self.dispatch(&lead).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LeadStatus;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn lead() -> Lead {
        let created = Utc.with_ymd_and_hms(2026, 3, 10, 14, 30, 0).unwrap();
        Lead {
            id: Uuid::new_v4(),
            course_id: None,
            schedule_id: None,
            full_name: "Maria Silva".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            cpf: "52998224725".to_string(),
            phone: "41999998888".to_string(),
            email: "maria@example.com".to_string(),
            city: "Curitiba".to_string(),
            state: "PR".to_string(),
            observations: None,
            terms_accepted: true,
            recording_authorized: false,
            status: LeadStatus::Novo,
            source: "website".to_string(),
            user_agent: None,
            ip_address: Some("203.0.113.7".to_string()),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_subject_format() {
        assert_eq!(
            render_subject(&lead()),
            "Nova inscrição – Maria Silva (Curitiba/PR)"
        );
    }

    #[test]
    fn test_body_uses_placeholders_for_missing_fields() {
        let body = render_body(&lead());
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines[0], "CURSO_ID: -");
        assert_eq!(lines[1], "TURMA_ID: -");
        assert_eq!(lines[12], "Nenhuma");
        assert_eq!(lines[15], "Aceito Termos: Sim");
        assert_eq!(lines[16], "Aceito Gravação: Não");
        assert_eq!(lines[18], "Status: novo | Origem: website");
        assert_eq!(lines[19], "IP: 203.0.113.7 | UA: -");
        assert_eq!(lines[20], "Data/Hora: 2026-03-10T14:30:00+00:00");
    }

    #[test]
    fn test_body_is_deterministic() {
        let lead = lead();
        assert_eq!(render_body(&lead), render_body(&lead));
    }

    #[test]
    fn test_body_carries_identifiers_and_observations() {
        let mut lead = lead();
        let course = Uuid::new_v4();
        lead.course_id = Some(course);
        lead.observations = Some("Prefiro turma de sábado".to_string());

        let body = render_body(&lead);
        assert!(body.starts_with(&format!("CURSO_ID: {}\n", course)));
        assert!(body.contains("OBSERVAÇÕES:\nPrefiro turma de sábado\n"));
    }
}
