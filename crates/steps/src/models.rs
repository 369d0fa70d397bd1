//! Domain models shared by the step executors and the engine.
//!
//! These types mirror the JSON the form editor saves: a form definition
//! (pages, elements, workflow step list) and a submission.  The engine only
//! ever reads them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Submitted values keyed by element id.
pub type FormData = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Form definition
// ---------------------------------------------------------------------------

/// Snapshot of a form as seen by one workflow run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub workflow: Vec<WorkflowStep>,
}

impl FormDefinition {
    /// All elements across every page, in page then element order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.pages.iter().flat_map(|page| page.elements.iter())
    }

    /// Look up an element by id.
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements().find(|element| element.id == id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// One form element.  Only the fields that matter to workflows and
/// submission checks are modelled; layout and styling are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Submit,
    Number,
    Email,
    Date,
    File,
    Heading,
    Paragraph,
    Divider,
    Time,
    Datetime,
    Url,
    Tel,
    Password,
    Color,
    Range,
    Image,
    Video,
    Audio,
    Table,
    Rating,
    Signature,
    Location,
    Payment,
    Multiselect,
    Toggle,
    Button,
    Link,
    Spacer,
    Code,
    Html,
    Calculation,
    Section,
    Tabs,
    Accordion,
    Card,
    Progress,
    Matrix,
    Ranking,
    Likert,
    Nps,
    Embed,
    Qr,
    Chart,
    #[serde(other)]
    Other,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Submit => "submit",
            Self::Number => "number",
            Self::Email => "email",
            Self::Date => "date",
            Self::File => "file",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::Divider => "divider",
            Self::Time => "time",
            Self::Datetime => "datetime",
            Self::Url => "url",
            Self::Tel => "tel",
            Self::Password => "password",
            Self::Color => "color",
            Self::Range => "range",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Table => "table",
            Self::Rating => "rating",
            Self::Signature => "signature",
            Self::Location => "location",
            Self::Payment => "payment",
            Self::Multiselect => "multiselect",
            Self::Toggle => "toggle",
            Self::Button => "button",
            Self::Link => "link",
            Self::Spacer => "spacer",
            Self::Code => "code",
            Self::Html => "html",
            Self::Calculation => "calculation",
            Self::Section => "section",
            Self::Tabs => "tabs",
            Self::Accordion => "accordion",
            Self::Card => "card",
            Self::Progress => "progress",
            Self::Matrix => "matrix",
            Self::Ranking => "ranking",
            Self::Likert => "likert",
            Self::Nps => "nps",
            Self::Embed => "embed",
            Self::Qr => "qr",
            Self::Chart => "chart",
            Self::Other => "other",
        }
    }

    /// Layout-only elements never carry a submitted value.
    pub fn is_decorative(&self) -> bool {
        matches!(
            self,
            Self::Submit
                | Self::Heading
                | Self::Paragraph
                | Self::Divider
                | Self::Spacer
                | Self::Button
                | Self::Link
                | Self::Html
                | Self::Section
                | Self::Tabs
                | Self::Accordion
                | Self::Card
                | Self::Progress
                | Self::Image
                | Self::Video
                | Self::Audio
                | Self::Embed
                | Self::Qr
                | Self::Chart
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(rename = "type")]
    pub kind: ValidationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationKind {
    Required,
    MinLength,
    MaxLength,
    Email,
    Pattern,
    Min,
    Max,
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown submission status: {other}")),
        }
    }
}

/// One filled-in instance of a form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub form_id: String,
    pub data: FormData,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub status: SubmissionStatus,
}

impl Submission {
    /// A fresh `pending` submission received now.
    pub fn pending(id: impl Into<String>, form_id: impl Into<String>, data: FormData) -> Self {
        Self {
            id: id.into(),
            form_id: form_id.into(),
            data,
            submitted_at: Utc::now(),
            ip_address: None,
            user_agent: None,
            status: SubmissionStatus::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Condition,
    Notification,
    Action,
    Integration,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Condition => write!(f, "condition"),
            Self::Notification => write!(f, "notification"),
            Self::Action => write!(f, "action"),
            Self::Integration => write!(f, "integration"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

/// One unit of workflow automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub config: StepConfig,
}

/// Wire shape of a step's configuration: one optional branch per step type.
///
/// Use [`WorkflowStep::spec`] to get the branch that matches the step type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<IntegrationConfig>,
}

impl StepConfig {
    /// Names of the populated branches.
    pub fn populated(&self) -> Vec<StepKind> {
        let mut kinds = Vec::new();
        if self.condition.is_some() {
            kinds.push(StepKind::Condition);
        }
        if self.notification.is_some() {
            kinds.push(StepKind::Notification);
        }
        if self.action.is_some() {
            kinds.push(StepKind::Action);
        }
        if self.integration.is_some() {
            kinds.push(StepKind::Integration);
        }
        kinds
    }
}

/// The configuration branch selected by a step's type tag.
#[derive(Debug, Clone, Copy)]
pub enum StepSpec<'a> {
    Condition(&'a ConditionConfig),
    Notification(&'a NotificationConfig),
    Action(&'a ActionConfig),
    Integration(&'a IntegrationConfig),
}

/// Reasons a step's configuration does not match its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecMismatch {
    UnknownType,
    Missing(StepKind),
    Conflicting { kind: StepKind, extra: Vec<StepKind> },
}

impl std::fmt::Display for SpecMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType => write!(f, "Unknown step type"),
            Self::Missing(kind) => write!(f, "No {kind} configuration found"),
            Self::Conflicting { kind, extra } => {
                let extra: Vec<String> = extra.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "Configuration for {kind} step also contains {} settings",
                    extra.join(", ")
                )
            }
        }
    }
}

impl WorkflowStep {
    /// Check the type tag and return the single matching config branch.
    pub fn spec(&self) -> Result<StepSpec<'_>, SpecMismatch> {
        let extra: Vec<StepKind> = self
            .config
            .populated()
            .into_iter()
            .filter(|kind| *kind != self.kind)
            .collect();

        let spec = match self.kind {
            StepKind::Condition => self.config.condition.as_ref().map(StepSpec::Condition),
            StepKind::Notification => self.config.notification.as_ref().map(StepSpec::Notification),
            StepKind::Action => self.config.action.as_ref().map(StepSpec::Action),
            StepKind::Integration => self.config.integration.as_ref().map(StepSpec::Integration),
            StepKind::Unknown => return Err(SpecMismatch::UnknownType),
        };

        let spec = spec.ok_or(SpecMismatch::Missing(self.kind))?;
        if !extra.is_empty() {
            return Err(SpecMismatch::Conflicting { kind: self.kind, extra });
        }
        Ok(spec)
    }
}

// ------ condition ------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub actions: Vec<ConditionAction>,
}

/// A follow-up the form should perform when a condition matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

// ------ notification ------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Sms,
    Slack,
    Push,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Slack incoming-webhook URL; falls back to the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

// ------ action ------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Webhook,
    Redirect,
    Database,
    Calculation,
    #[serde(other)]
    Unsupported,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webhook => write!(f, "webhook"),
            Self::Redirect => write!(f, "redirect"),
            Self::Database => write!(f, "database"),
            Self::Calculation => write!(f, "calculation"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)]
pub enum HttpMethod {
    GET,
    #[default]
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GET => "GET",
            Self::POST => "POST",
            Self::PUT => "PUT",
            Self::PATCH => "PATCH",
            Self::DELETE => "DELETE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Target table for `database` actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub additional_fields: serde_json::Map<String, Value>,
}

// ------ integration ------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationService {
    Zapier,
    Custom,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    pub service: IntegrationService,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Form field id → external field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub additional_data: serde_json::Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_without_optional_fields_deserializes_with_defaults() {
        let step: WorkflowStep = serde_json::from_value(json!({
            "type": "action",
            "title": "X",
            "config": { "action": { "type": "webhook" } }
        }))
        .expect("valid step");

        assert_eq!(step.kind, StepKind::Action);
        assert!(step.enabled);
        assert_eq!(step.order, 0);
        assert!(matches!(step.spec(), Ok(StepSpec::Action(a)) if a.kind == ActionKind::Webhook));
    }

    #[test]
    fn missing_branch_is_reported() {
        let step: WorkflowStep = serde_json::from_value(json!({
            "id": "s1", "type": "notification", "title": "Mail", "config": {}
        }))
        .unwrap();
        let err = step.spec().unwrap_err();
        assert_eq!(err, SpecMismatch::Missing(StepKind::Notification));
        assert_eq!(err.to_string(), "No notification configuration found");
    }

    #[test]
    fn conflicting_branches_are_rejected() {
        let step: WorkflowStep = serde_json::from_value(json!({
            "type": "action",
            "title": "Both",
            "config": {
                "action": { "type": "redirect", "endpoint": "https://example.com" },
                "condition": { "field": "a", "operator": "equals", "value": "b", "actions": [] }
            }
        }))
        .unwrap();
        assert!(matches!(step.spec(), Err(SpecMismatch::Conflicting { .. })));
    }

    #[test]
    fn unknown_kinds_fall_back_instead_of_failing_to_parse() {
        let step: WorkflowStep =
            serde_json::from_value(json!({ "type": "teleport", "title": "?" })).unwrap();
        assert_eq!(step.kind, StepKind::Unknown);
        assert_eq!(step.spec().unwrap_err(), SpecMismatch::UnknownType);

        let element: Element =
            serde_json::from_value(json!({ "id": "e", "type": "hologram" })).unwrap();
        assert_eq!(element.kind, ElementKind::Other);
    }
}
