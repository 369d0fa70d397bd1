//! Field-level checks applied to a submission before it is stored.
//!
//! Each input element is checked against its `required` flag, its
//! `validation` rules and the built-in format for its type.  Optional fields
//! left empty skip every other check.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use url::Url;

use steps::models::{Element, ElementKind, FormData, FormDefinition, ValidationKind, ValidationRule};
use steps::value::to_number;

/// Element id → messages, for every element that failed.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());
static PHONE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").ok());

/// Check every element of `form` against `data`.
pub fn check_submission(form: &FormDefinition, data: &FormData) -> FieldErrors {
    form.elements()
        .filter(|element| !element.kind.is_decorative())
        .filter_map(|element| {
            let messages = check_element(element, data.get(&element.id));
            (!messages.is_empty()).then(|| (element.id.clone(), messages))
        })
        .collect()
}

pub fn check_element(element: &Element, value: Option<&Value>) -> Vec<String> {
    let label = if element.label.trim().is_empty() { &element.id } else { &element.label };

    if is_blank(value) {
        let required = element.required
            || element.validation.iter().any(|r| r.kind == ValidationKind::Required);
        if !required {
            return Vec::new();
        }
        let message = element
            .validation
            .iter()
            .find(|r| r.kind == ValidationKind::Required && !r.message.is_empty())
            .map(|r| r.message.clone())
            .unwrap_or_else(|| format!("{label} is required"));
        return vec![message];
    }

    let Some(value) = value else {
        return Vec::new();
    };

    let mut errors: Vec<String> = element
        .validation
        .iter()
        .filter_map(|rule| check_rule(rule, value, label))
        .collect();

    if let Some(message) = check_type(element.kind, value, label) {
        if !errors.contains(&message) {
            errors.push(message);
        }
    }
    errors
}

/// Absent, null, `""`, `[]` or `{}`.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn check_rule(rule: &ValidationRule, value: &Value, label: &str) -> Option<String> {
    let or_message = |fallback: String| {
        Some(if rule.message.is_empty() { fallback } else { rule.message.clone() })
    };
    let limit = rule.value.as_ref().map(|v| to_number(Some(v))).filter(|n| n.is_finite());
    let limit_text = rule
        .value
        .as_ref()
        .map(|v| steps::value::to_text(Some(v)))
        .unwrap_or_default();

    match rule.kind {
        // Blank values were handled by the caller.
        ValidationKind::Required | ValidationKind::Unknown => None,
        ValidationKind::Email => match value.as_str() {
            Some(s) if is_email(s) => None,
            _ => or_message(format!("{label} must be a valid email address")),
        },
        ValidationKind::MinLength => {
            let (s, min) = (value.as_str()?, limit?);
            if (s.chars().count() as f64) < min {
                return or_message(format!("{label} must be at least {limit_text} characters long"));
            }
            None
        }
        ValidationKind::MaxLength => {
            let (s, max) = (value.as_str()?, limit?);
            if (s.chars().count() as f64) > max {
                return or_message(format!(
                    "{label} must be no more than {limit_text} characters long"
                ));
            }
            None
        }
        ValidationKind::Min => {
            let (n, min) = (numeric(value)?, limit?);
            if n < min {
                return or_message(format!("{label} must be at least {limit_text}"));
            }
            None
        }
        ValidationKind::Max => {
            let (n, max) = (numeric(value)?, limit?);
            if n > max {
                return or_message(format!("{label} must be no more than {limit_text}"));
            }
            None
        }
        ValidationKind::Pattern => {
            let (s, pattern) = (value.as_str()?, rule.value.as_ref()?.as_str()?);
            match Regex::new(pattern) {
                Ok(re) if re.is_match(s) => None,
                Ok(_) => or_message(format!("{label} format is invalid")),
                Err(_) => Some(format!("{label} has an invalid pattern rule")),
            }
        }
    }
}

fn check_type(kind: ElementKind, value: &Value, label: &str) -> Option<String> {
    let ok = match kind {
        ElementKind::Email => value.as_str().is_some_and(is_email),
        ElementKind::Url => value.as_str().is_some_and(|s| Url::parse(s).is_ok()),
        ElementKind::Tel => value.as_str().is_some_and(is_phone),
        ElementKind::Number => numeric(value).is_some(),
        ElementKind::Date => value.as_str().is_some_and(is_date),
        _ => return None,
    };
    if ok {
        return None;
    }

    let what = match kind {
        ElementKind::Email => "email address",
        ElementKind::Url => "URL",
        ElementKind::Tel => "phone number",
        ElementKind::Number => "number",
        _ => "date",
    };
    Some(format!("{label} must be a valid {what}"))
}

/// Numbers, and strings that read as a finite number.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(_) | Value::String(_) => {
            Some(to_number(Some(value))).filter(|n| n.is_finite())
        }
        _ => None,
    }
}

fn is_email(s: &str) -> bool {
    EMAIL.as_ref().is_some_and(|re| re.is_match(s))
}

fn is_phone(s: &str) -> bool {
    let digits: String = s
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    PHONE.as_ref().is_some_and(|re| re.is_match(&digits))
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
}
