use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use super::error::SecretsError;

/// Client for the remote key-value secret store.
///
/// The store is an external collaborator: one GET per fetch, bearer-token
/// auth, no caching. Secret values are never logged; only their lengths are.
#[derive(Debug, Clone)]
pub struct SecretStore {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretResponse {
    #[allow(dead_code)]
    name: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

impl SecretStore {
    pub fn new(endpoint: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            token,
        }
    }

    /// Fetch the raw payload of a named secret.
    #[tracing::instrument(skip(self), fields(%name, %region), err)]
    pub async fn fetch(&self, name: &str, region: &str) -> Result<String, SecretsError> {
        let Some(token) = &self.token else {
            return Err(SecretsError::MissingCredentials(
                "STAGEHAND_SECRETS_TOKEN is not set".into(),
            ));
        };

        let url = format!("{}/v1/secrets/{region}/{name}", self.endpoint);
        tracing::debug!(%url, "requesting secret value");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let message = resp
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| status.to_string());
            return Err(classify_failure(status.as_u16(), name, message));
        }

        let body: SecretResponse = resp
            .json()
            .await
            .map_err(|e| SecretsError::Malformed(format!("unreadable secret response: {e}")))?;

        let value = body
            .value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SecretsError::Malformed(format!("secret {name} has no value")))?;

        tracing::info!(secret_length = value.len(), "secret retrieved");
        Ok(value)
    }

    /// Fetch a secret whose payload is itself a JSON object, parsed into a
    /// key-value mapping. Malformed content is a structured-parse error.
    #[tracing::instrument(skip(self), fields(%name, %region), err)]
    pub async fn fetch_structured(
        &self,
        name: &str,
        region: &str,
    ) -> Result<BTreeMap<String, serde_json::Value>, SecretsError> {
        let raw = self.fetch(name, region).await?;

        let parsed: BTreeMap<String, serde_json::Value> = serde_json::from_str(&raw)
            .map_err(|e| SecretsError::Malformed(format!("secret {name} is not a JSON object: {e}")))?;

        tracing::info!(keys = parsed.len(), "secret parsed as JSON");
        Ok(parsed)
    }
}

/// Map a non-2xx store response onto the error taxonomy.
fn classify_failure(status: u16, name: &str, message: String) -> SecretsError {
    match status {
        401 | 403 => SecretsError::MissingCredentials(message),
        404 => SecretsError::NotFound(name.to_owned()),
        400 | 422 => SecretsError::Malformed(message),
        500..=599 => SecretsError::Transient { status, message },
        _ => SecretsError::Unclassified { status, message },
    }
}
