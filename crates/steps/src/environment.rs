//! Process-wide settings visible to every step.
//!
//! Built once at startup and shared read-only; absent groups are `None`
//! and turn into step failures when a step needs them.

use std::fmt;

pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

#[derive(Clone, Default)]
pub struct Environment {
    pub smtp: Option<SmtpSettings>,
    pub twilio: Option<TwilioSettings>,
    pub slack_webhook_url: Option<String>,
    pub push_gateway_url: Option<String>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("smtp", &self.smtp)
            .field("twilio", &self.twilio)
            .field("slack_webhook_url", &self.slack_webhook_url.as_ref().map(|_| "<set>"))
            .field("push_gateway_url", &self.push_gateway_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// Implicit TLS on connect; otherwise STARTTLS.
    pub secure: bool,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

#[derive(Clone)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_base: String,
}

impl TwilioSettings {
    pub fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        )
    }
}

impl fmt::Debug for TwilioSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioSettings")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_number", &self.from_number)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secrets() {
        let env = Environment {
            smtp: Some(SmtpSettings {
                host: "smtp.example.com".into(),
                port: 587,
                secure: false,
                username: "forms".into(),
                password: "hunter2".into(),
                from: "forms@example.com".into(),
            }),
            twilio: Some(TwilioSettings {
                account_sid: "AC1".into(),
                auth_token: "tok".into(),
                from_number: "+15550000".into(),
                api_base: format!("{TWILIO_API_BASE}/"),
            }),
            slack_webhook_url: Some("https://hooks.slack.com/services/secret".into()),
            push_gateway_url: None,
        };
        let rendered = format!("{env:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("tok\""));
        assert!(!rendered.contains("services/secret"));
        assert_eq!(
            env.twilio.unwrap().messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC1/Messages.json"
        );
    }
}
