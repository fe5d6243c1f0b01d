use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize)]
struct AskRequest {
    message: String,
}

/// A reply from the coach endpoint, with its HTTP status attached.
///
/// Any completed exchange with a JSON body parses into this, whatever the
/// status code. Application errors ride in `error`; the flags and `avatar`
/// are optional extras the backend may omit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachReply {
    #[serde(skip)]
    pub status: u16,
    pub response: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub show_confetti: bool,
    #[serde(default)]
    pub show_emojis: bool,
    pub avatar: Option<String>,
}

#[derive(Debug, Error)]
pub enum CoachError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid reply from server (status {status}): {source}")]
    MalformedReply {
        status: u16,
        source: serde_json::Error,
    },
}

/// HTTP client for the coach bot endpoint.
///
/// Owns a cookie jar so `Set-Cookie` headers from the backend persist across
/// a session; the CSRF token is read back out of the jar by name and sent as
/// `X-CSRFToken` on each ask.
#[derive(Clone)]
pub struct CoachClient {
    client: Client,
    jar: Arc<Jar>,
    endpoint: String,
    csrf_cookie: String,
}

impl CoachClient {
    pub fn new(endpoint: &str, csrf_cookie: &str) -> anyhow::Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder().cookie_provider(jar.clone()).build()?;

        Ok(Self {
            client,
            jar,
            endpoint: endpoint.to_string(),
            csrf_cookie: csrf_cookie.to_string(),
        })
    }

    pub async fn ask(&self, message: &str) -> Result<CoachReply, CoachError> {
        let request = AskRequest {
            message: message.to_string(),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = self.csrf_token() {
            builder = builder.header("X-CSRFToken", token);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        tracing::debug!(status, bytes = body.len(), "coach reply received");
        parse_reply(status, &body)
    }

    /// Read the CSRF token out of the cookie jar. Returns None when the
    /// backend has not set the cookie yet; the ask is still sent, just
    /// without the header.
    pub fn csrf_token(&self) -> Option<String> {
        let url = self.endpoint.parse::<Url>().ok()?;
        let header = self.jar.cookies(&url)?;
        cookie_value(header.to_str().ok()?, &self.csrf_cookie)
    }
}

/// Scan a `Cookie` header line (`name=value; name=value`) for one cookie.
/// The matched value is percent-decoded; a value that does not decode to
/// UTF-8 counts as absent.
fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        if key != name {
            return None;
        }
        let decoded = urlencoding::decode(value).ok()?;
        Some(decoded.into_owned())
    })
}

fn parse_reply(status: u16, body: &[u8]) -> Result<CoachReply, CoachError> {
    match serde_json::from_slice::<CoachReply>(body) {
        Ok(mut reply) => {
            reply.status = status;
            Ok(reply)
        }
        Err(source) => Err(CoachError::MalformedReply { status, source }),
    }
}
