//! `{{placeholder}}` substitution for subjects, messages and request bodies.
//!
//! A placeholder names either a submitted field or one of the system values
//! `timestamp`, `formTitle` and `submissionId`; fields take precedence.
//! Unknown names stay in the output untouched.  Substituted text is never
//! scanned again, so a field value containing `{{...}}` cannot pull in other
//! values.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::models::FormData;
use crate::value::to_text;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Values visible to placeholders.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub fields: &'a FormData,
    pub form_title: &'a str,
    pub submission_id: &'a str,
}

impl TemplateVars<'_> {
    fn lookup(&self, name: &str, now: DateTime<Utc>) -> Option<String> {
        if let Some(value) = self.fields.get(name) {
            return Some(to_text(Some(value)));
        }
        match name {
            "timestamp" => Some(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            "formTitle" => Some(self.form_title.to_owned()),
            "submissionId" => Some(self.submission_id.to_owned()),
            _ => None,
        }
    }
}

/// Resolve every placeholder in `template`, stamping `{{timestamp}}` with now.
pub fn resolve(template: &str, vars: &TemplateVars<'_>) -> String {
    resolve_at(template, vars, Utc::now())
}

/// Resolve with a fixed instant for `{{timestamp}}`.
pub fn resolve_at(template: &str, vars: &TemplateVars<'_>, now: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after_open[..end];
        if name.contains(OPEN) {
            // "{{a {{b}}": the inner opening belongs to the real placeholder.
            out.push_str(OPEN);
            rest = after_open;
            continue;
        }

        match vars.lookup(name, now) {
            Some(text) => out.push_str(&text),
            None => {
                out.push_str(OPEN);
                out.push_str(name);
                out.push_str(CLOSE);
            }
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

/// Walk a JSON value depth-first, resolving every string leaf.
pub fn resolve_value(value: &Value, vars: &TemplateVars<'_>) -> Value {
    let now = Utc::now();
    resolve_value_at(value, vars, now)
}

fn resolve_value_at(value: &Value, vars: &TemplateVars<'_>, now: DateTime<Utc>) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_at(s, vars, now)),
        Value::Array(items) => Value::Array(
            items.iter().map(|item| resolve_value_at(item, vars, now)).collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), resolve_value_at(item, vars, now)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fields() -> FormData {
        json!({ "name": "Ada", "age": 36, "tags": ["a", "b"], "formTitle": "shadowed" })
            .as_object()
            .cloned()
            .unwrap()
    }

    fn vars(fields: &FormData) -> TemplateVars<'_> {
        TemplateVars { fields, form_title: "Contact", submission_id: "sub_1" }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn fields_and_system_values_are_substituted_everywhere() {
        let f = fields();
        let out = resolve_at(
            "Hi {{name}} ({{age}}), {{name}}! #{{submissionId}} at {{timestamp}}",
            &vars(&f),
            fixed_now(),
        );
        assert_eq!(out, "Hi Ada (36), Ada! #sub_1 at 2024-05-01T12:30:00.000Z");
    }

    #[test]
    fn fields_win_over_system_names() {
        let f = fields();
        assert_eq!(resolve_at("{{formTitle}}", &vars(&f), fixed_now()), "shadowed");
    }

    #[test]
    fn unknown_placeholders_stay_literal() {
        let f = fields();
        assert_eq!(
            resolve_at("{{missing}} and {{ name }} and {{unclosed", &vars(&f), fixed_now()),
            "{{missing}} and {{ name }} and {{unclosed"
        );
    }

    #[test]
    fn nested_opening_resolves_inner_placeholder() {
        let f = fields();
        assert_eq!(resolve_at("{{x {{name}}", &vars(&f), fixed_now()), "{{x Ada");
    }

    #[test]
    fn injected_placeholders_are_not_expanded() {
        let f: FormData = json!({ "evil": "{{submissionId}}" }).as_object().cloned().unwrap();
        assert_eq!(resolve_at("{{evil}}", &vars(&f), fixed_now()), "{{submissionId}}");
    }

    #[test]
    fn resolving_twice_is_stable() {
        let f = fields();
        let template = "{{name}} {{tags}} {{timestamp}} {{nope}} {{formTitle}}";
        let once = resolve_at(template, &vars(&f), fixed_now());
        let twice = resolve(&once, &vars(&f));
        assert_eq!(once, twice);
    }

    #[test]
    fn json_values_are_walked_depth_first() {
        let f = fields();
        let body = json!({
            "who": "{{name}}",
            "list": ["{{age}}", 7, null],
            "nested": { "ok": true, "id": "{{submissionId}}" }
        });
        let out = resolve_value(&body, &vars(&f));
        assert_eq!(
            out,
            json!({
                "who": "Ada",
                "list": ["36", 7, null],
                "nested": { "ok": true, "id": "sub_1" }
            })
        );
    }
}
