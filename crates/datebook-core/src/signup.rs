//! Account signup: client-side validation and a single JSON POST.

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_ENDPOINT: &str = "https://perfume-backend-nine.vercel.app/api/users/register";
pub const SUCCESS_TITLE: &str = "Signup Successful";
pub const SUCCESS_MESSAGE: &str = "You can now log in with your credentials.";
pub const ERROR_TITLE: &str = "Signup Error";

const MIN_PASSWORD_LEN: usize = 8;
const SERVER_FALLBACK: &str = "Signup failed. Please try again.";
const TRANSPORT_FALLBACK: &str = "An unexpected error occurred";
const MALFORMED_REPLY: &str = "Signup response was not valid JSON";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("All fields are required")]
    MissingField,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
}

/// Failure of a signup attempt. `Display` is the text of the user alert.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignupError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

impl SignupForm {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() || self.email.is_empty() || self.password.is_empty() {
            return Err(ValidationError::MissingField);
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// `None` when the body could not be parsed as JSON.
    pub body: Option<Value>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one JSON request. Implementations must not retry.
pub trait SignupTransport {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> impl Future<Output = anyhow::Result<TransportResponse>>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed building HTTP client for signup")?;
        Ok(Self { client })
    }
}

impl SignupTransport for HttpTransport {
    #[instrument(skip(self, body))]
    async fn post_json(&self, url: &str, body: &Value) -> anyhow::Result<TransportResponse> {
        let payload = serde_json::to_vec(body).context("failed encoding signup payload")?;
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .with_context(|| format!("failed requesting {url}"))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .context("failed reading signup response body")?;
        let body = serde_json::from_str::<Value>(&text)
            .inspect_err(|err| debug!(status, error = %err, "signup response was not JSON"))
            .ok();

        Ok(TransportResponse { status, body })
    }
}

pub struct SignupClient<T> {
    transport: T,
    endpoint: String,
}

impl<T: SignupTransport> SignupClient<T> {
    pub fn new(transport: T, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validates `form`, then posts it once. Nothing is sent when
    /// validation fails.
    #[instrument(skip(self, form), fields(endpoint = %self.endpoint, email = %form.email))]
    pub async fn submit(&self, form: &SignupForm) -> Result<(), SignupError> {
        form.validate().inspect_err(|err| {
            debug!(error = %err, "signup form rejected");
        })?;

        let body = serde_json::json!({
            "name": form.name,
            "email": form.email,
            "password": form.password,
        });

        let response = self
            .transport
            .post_json(&self.endpoint, &body)
            .await
            .map_err(|err| {
                warn!(error = %err, "signup request failed");
                let text = format!("{err:#}");
                SignupError::Transport(if text.trim().is_empty() {
                    TRANSPORT_FALLBACK.to_string()
                } else {
                    text
                })
            })?;

        if !response.is_success() {
            let message = response
                .body
                .as_ref()
                .and_then(|body| body.get("message"))
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or(SERVER_FALLBACK)
                .to_string();
            warn!(status = response.status, %message, "signup rejected by server");
            return Err(SignupError::Server {
                status: response.status,
                message,
            });
        }

        if response.body.is_none() {
            warn!(status = response.status, "signup accepted but reply was not JSON");
            return Err(SignupError::Transport(MALFORMED_REPLY.to_string()));
        }

        info!(status = response.status, "signup accepted");
        Ok(())
    }
}
