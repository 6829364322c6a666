//! HTTP adapter for bearer-token APIs and webhooks
//!
//! One adapter type serves every built-in platform; the
//! [`PlatformProfile`] decides content rules, endpoint style and the JSON
//! field carrying the text.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::profiles::{Delivery, PlatformProfile};
use super::{
    classify_error, validate_common, ErrorDisposition, PlatformAdapter, PublishReceipt,
    ValidationResult,
};
use crate::config::PlatformConfig;
use crate::error::PlatformError;
use crate::types::Post;

pub struct HttpAdapter {
    profile: PlatformProfile,
    client: reqwest::Client,
    endpoint: Option<String>,
    access_token: Option<SecretString>,
}

impl HttpAdapter {
    pub fn new(profile: PlatformProfile, config: &PlatformConfig) -> Self {
        Self::with_client(profile, config, reqwest::Client::new())
    }

    /// Create an adapter sharing an existing connection pool
    pub fn with_client(
        profile: PlatformProfile,
        config: &PlatformConfig,
        client: reqwest::Client,
    ) -> Self {
        let endpoint = match profile.delivery {
            Delivery::BearerApi => config.api_url.clone(),
            Delivery::Webhook => config.webhook_url.clone(),
        };
        let access_token = config
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .map(SecretString::from);

        Self {
            profile,
            client,
            endpoint: endpoint.filter(|e| !e.is_empty()),
            access_token,
        }
    }

    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    /// True if the endpoint and credentials needed to publish are present
    pub fn is_configured(&self) -> bool {
        match self.profile.delivery {
            Delivery::BearerApi => self.endpoint.is_some() && self.access_token.is_some(),
            Delivery::Webhook => self.endpoint.is_some(),
        }
    }

    fn body(&self, post: &Post) -> Value {
        let mut body = serde_json::Map::new();
        body.insert(self.profile.text_field.to_string(), json!(post.content));
        if self.profile.delivery == Delivery::BearerApi {
            body.insert("media".to_string(), json!(post.media_urls));
        }
        Value::Object(body)
    }

    fn request(&self, post: &Post) -> Result<reqwest::RequestBuilder, PlatformError> {
        let missing = || {
            let what = match self.profile.delivery {
                Delivery::BearerApi => "access token or API URL",
                Delivery::Webhook => "webhook URL",
            };
            PlatformError::api(
                PlatformError::BAD_REQUEST,
                format!("Missing {} for {}", what, self.profile.name),
            )
        };

        let endpoint = self.endpoint.as_deref().ok_or_else(missing)?;
        let builder = self.client.post(endpoint).json(&self.body(post));

        match self.profile.delivery {
            Delivery::BearerApi => {
                let token = self.access_token.as_ref().ok_or_else(missing)?;
                Ok(builder.bearer_auth(token.expose_secret()))
            }
            Delivery::Webhook => Ok(builder),
        }
    }

    fn synthesized_id(&self) -> String {
        format!(
            "{}-{}",
            self.profile.id_prefix,
            chrono::Utc::now().timestamp_millis()
        )
    }
}

/// Build a platform error from a non-success response
///
/// Graph-style bodies (`{"error": {"code": N, "message": "..."}}`) supply the
/// code; otherwise the HTTP status stands in for it. The status is kept
/// either way.
fn error_from_response(status: reqwest::StatusCode, body: &str) -> PlatformError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let code = error
        .and_then(|e| e.get("code"))
        .and_then(Value::as_i64)
        .unwrap_or_else(|| i64::from(status.as_u16()));
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.chars().take(200).collect()
            }
        });

    PlatformError::Http {
        status: status.as_u16(),
        code,
        message,
    }
}

/// Pull an id out of a success body, accepting string or numeric ids
fn external_id_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl PlatformAdapter for HttpAdapter {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn validate_content(&self, post: &Post) -> ValidationResult {
        validate_common(post, self.profile.max_length, self.profile.media)
    }

    async fn publish(&self, post: &Post) -> Result<PublishReceipt, PlatformError> {
        let request = self.request(post)?;
        debug!(platform = self.profile.name, post_id = %post.id, "sending publish request");

        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_response(status, &body));
        }

        let external_id = external_id_from_body(&body).unwrap_or_else(|| self.synthesized_id());
        Ok(PublishReceipt { external_id })
    }

    fn handle_error(&self, error: &PlatformError, _post: &Post) -> ErrorDisposition {
        // Transport status wins over whatever code the body carried
        let status = error
            .status()
            .map(i64::from)
            .or_else(|| error.code());
        match status {
            Some(429) => ErrorDisposition::retry("rate_limited", Duration::from_secs(15 * 60)),
            Some(code) if (500..=599).contains(&code) => {
                ErrorDisposition::retry("upstream_unavailable", Duration::from_secs(60))
            }
            _ => classify_error(error),
        }
    }
}
