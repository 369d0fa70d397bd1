//! Process configuration: command-line flags, each also readable from the
//! environment.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use engine::transports::{ReqwestHttp, SmtpMailer, DEFAULT_HTTP_TIMEOUT};
use steps::environment::{SmtpSettings, TwilioSettings, TWILIO_API_BASE};
use steps::{Environment, Transports};

#[derive(Debug, Clone, Args)]
pub struct SmtpArgs {
    #[arg(long = "smtp-host", env = "SMTP_HOST")]
    pub host: Option<String>,

    #[arg(long = "smtp-port", env = "SMTP_PORT", default_value_t = 587)]
    pub port: u16,

    /// Connect with implicit TLS instead of STARTTLS.
    #[arg(long = "smtp-secure", env = "SMTP_SECURE", default_value_t = false)]
    pub secure: bool,

    #[arg(long = "smtp-user", env = "SMTP_USER")]
    pub user: Option<String>,

    #[arg(long = "smtp-pass", env = "SMTP_PASS", hide_env_values = true)]
    pub pass: Option<String>,

    /// Sender mailbox; defaults to the SMTP user.
    #[arg(long = "smtp-from", env = "SMTP_FROM")]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct TwilioArgs {
    #[arg(long = "twilio-account-sid", env = "TWILIO_ACCOUNT_SID")]
    pub account_sid: Option<String>,

    #[arg(long = "twilio-auth-token", env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    #[arg(long = "twilio-from-number", env = "TWILIO_FROM_NUMBER")]
    pub from_number: Option<String>,
}

/// Credentials and endpoints the step executors may need.
#[derive(Debug, Clone, Args)]
pub struct StepEnvArgs {
    #[command(flatten)]
    pub smtp: SmtpArgs,

    #[command(flatten)]
    pub twilio: TwilioArgs,

    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: Option<String>,

    #[arg(long, env = "PUSH_GATEWAY_URL")]
    pub push_gateway_url: Option<String>,
}

impl SmtpArgs {
    fn settings(&self) -> Option<SmtpSettings> {
        match (&self.host, &self.user, &self.pass) {
            (Some(host), Some(user), Some(pass)) => Some(SmtpSettings {
                host: host.clone(),
                port: self.port,
                secure: self.secure,
                username: user.clone(),
                password: pass.clone(),
                from: self.from.clone().unwrap_or_else(|| user.clone()),
            }),
            (None, None, None) => None,
            _ => {
                warn!("incomplete SMTP settings (need SMTP_HOST, SMTP_USER and SMTP_PASS); email is disabled");
                None
            }
        }
    }
}

impl TwilioArgs {
    fn settings(&self) -> Option<TwilioSettings> {
        match (&self.account_sid, &self.auth_token, &self.from_number) {
            (Some(sid), Some(token), Some(from)) => Some(TwilioSettings {
                account_sid: sid.clone(),
                auth_token: token.clone(),
                from_number: from.clone(),
                api_base: TWILIO_API_BASE.to_owned(),
            }),
            (None, None, None) => None,
            _ => {
                warn!("incomplete Twilio settings; SMS is disabled");
                None
            }
        }
    }
}

impl StepEnvArgs {
    pub fn environment(&self) -> Environment {
        Environment {
            smtp: self.smtp.settings(),
            twilio: self.twilio.settings(),
            slack_webhook_url: self.slack_webhook_url.clone(),
            push_gateway_url: self.push_gateway_url.clone(),
        }
    }
}

/// HTTP always; SMTP when configured.  Record sinks are added by the caller
/// when a database is available.
pub fn transports(environment: &Environment) -> Result<Transports> {
    let http = ReqwestHttp::new(DEFAULT_HTTP_TIMEOUT).context("failed to build HTTP transport")?;
    let mut transports = Transports::default().with_http(Arc::new(http));

    if let Some(smtp) = &environment.smtp {
        let mailer = SmtpMailer::new(smtp).context("failed to configure SMTP")?;
        info!(host = %smtp.host, port = smtp.port, "SMTP mailer configured");
        transports = transports.with_mailer(Arc::new(mailer));
    }
    Ok(transports)
}
