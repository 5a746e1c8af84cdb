//! Pure validators and formatters for the personal data collected by the
//! registration form.
//!
//! Validators return `bool` and never log or fail; callers aggregate the
//! results into a [`FieldErrors`] map.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

use crate::errors::FieldErrors;
use crate::models::LeadInput;

/// Minimum age, in whole years, to register for a course.
pub const MINIMUM_AGE: i32 = 18;

/// Shortest accepted full name, in characters.
pub const MINIMUM_NAME_CHARS: usize = 3;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));
static CONTROL_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Cc}+").expect("control-run pattern compiles"));

/// Keeps only ASCII digits.
pub fn digits_only(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validates a CPF (Brazilian individual taxpayer number).
///
/// Formatting characters are ignored. Rejects anything that is not 11 digits,
/// sequences of a single repeated digit, and numbers whose two modulus-11
/// check digits do not match.
pub fn validate_cpf(input: &str) -> bool {
    let digits: Vec<u32> = input.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() != 11 {
        return false;
    }
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    cpf_check_digit(&digits[..9]) == digits[9] && cpf_check_digit(&digits[..10]) == digits[10]
}

/// Check digit over `body` (9 or 10 digits), weights descending to 2.
fn cpf_check_digit(body: &[u32]) -> u32 {
    let weight_start = body.len() as u32 + 1;
    let sum: u32 = body
        .iter()
        .enumerate()
        .map(|(i, d)| d * (weight_start - i as u32))
        .sum();
    let remainder = (sum * 10) % 11;
    if remainder == 10 {
        0
    } else {
        remainder
    }
}

/// Accepts 10 or 11 digits: area code plus landline or mobile number.
pub fn validate_phone(input: &str) -> bool {
    matches!(digits_only(input).len(), 10 | 11)
}

/// Single `@`, non-empty local part, domain with a dot and no blanks.
pub fn validate_email(input: &str) -> bool {
    EMAIL_RE.is_match(input.trim())
}

/// True iff the ISO date (`YYYY-MM-DD`) is at least 18 years before today.
pub fn validate_age(birth_date_iso: &str) -> bool {
    validate_age_on(birth_date_iso, chrono::Local::now().date_naive())
}

/// [`validate_age`] against an explicit reference date.
pub fn validate_age_on(birth_date_iso: &str, today: NaiveDate) -> bool {
    match parse_birth_date(birth_date_iso) {
        Some(birth) if birth <= today => age_on(birth, today) >= MINIMUM_AGE,
        _ => false,
    }
}

pub fn parse_birth_date(birth_date_iso: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(birth_date_iso.trim(), "%Y-%m-%d").ok()
}

/// Age in whole years. The birthday itself counts as a completed year.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// Two ASCII letters once upper-cased (a UF such as `PR`).
pub fn validate_state(input: &str) -> bool {
    let state = input.trim();
    state.len() == 2 && state.chars().all(|c| c.is_ascii_alphabetic())
}

/// Display mask for a CPF: `529.982.247-25`, applied progressively while typing.
pub fn format_cpf(input: &str) -> String {
    let digits: String = digits_only(input).chars().take(11).collect();
    let len = digits.len();

    match len {
        0..=3 => digits,
        4..=6 => format!("{}.{}", &digits[..3], &digits[3..]),
        7..=9 => format!("{}.{}.{}", &digits[..3], &digits[3..6], &digits[6..]),
        _ => format!(
            "{}.{}.{}-{}",
            &digits[..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..]
        ),
    }
}

/// Display mask for a phone: `(41) 99999-8888` or `(41) 3333-4444`.
pub fn format_phone(input: &str) -> String {
    let digits: String = digits_only(input).chars().take(11).collect();
    let len = digits.len();

    match len {
        0 => String::new(),
        1..=2 => format!("({}", digits),
        3..=6 => format!("({}) {}", &digits[..2], &digits[2..]),
        7..=10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        _ => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
    }
}

/// Cleans free text before it is stored, mailed or exported.
///
/// Runs of control characters (newlines included) become one space, angle
/// brackets are dropped, double quotes become single quotes, and the result
/// is trimmed. Applying it twice gives the same result as applying it once.
pub fn sanitize_input(input: &str) -> String {
    CONTROL_RUN_RE
        .replace_all(input, " ")
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .map(|c| if c == '"' { '\'' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Aggregates every field failure of a registration payload.
pub fn validate_lead_input(input: &LeadInput, today: NaiveDate) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if sanitize_input(&input.full_name).chars().count() < MINIMUM_NAME_CHARS {
        errors.add("full_name", "Nome completo é obrigatório");
    }

    if input.birth_date.trim().is_empty() {
        errors.add("birth_date", "Data de nascimento é obrigatória");
    } else if parse_birth_date(&input.birth_date).is_none() {
        errors.add("birth_date", "Data de nascimento inválida");
    } else if !validate_age_on(&input.birth_date, today) {
        errors.add("birth_date", "Idade mínima: 18 anos");
    }

    if input.cpf.trim().is_empty() {
        errors.add("cpf", "CPF é obrigatório");
    } else if !validate_cpf(&input.cpf) {
        errors.add("cpf", "CPF inválido");
    }

    if input.phone.trim().is_empty() {
        errors.add("phone", "Telefone é obrigatório");
    } else if !validate_phone(&input.phone) {
        errors.add("phone", "Telefone inválido");
    }

    let email = sanitize_input(&input.email);
    if email.is_empty() {
        errors.add("email", "E-mail é obrigatório");
    } else if !validate_email(&email) {
        errors.add("email", "E-mail inválido");
    }

    if sanitize_input(&input.city).is_empty() {
        errors.add("city", "Cidade é obrigatória");
    }

    let state = sanitize_input(&input.state);
    if state.is_empty() {
        errors.add("state", "UF é obrigatório");
    } else if !validate_state(&state) {
        errors.add("state", "UF inválida");
    }

    if !input.terms_accepted {
        errors.add("terms_accepted", "Você deve aceitar os termos");
    }

    errors.into_result()
}
