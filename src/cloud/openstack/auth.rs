use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::check_status;
use crate::cloud::ServiceType;
use crate::config::ProjectScope;
use crate::types::PasswordCredentials;
use crate::types::error::PurgeError;

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Keystone token plus the data of the token body the client needs.
#[derive(Clone)]
pub(crate) struct AuthSession {
    pub(crate) token: String,
    pub(crate) user_id: String,
    pub(crate) project_id: String,
    pub(crate) catalog: Vec<CatalogEntry>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &"** redacted **")
            .field("user_id", &self.user_id)
            .field("project_id", &self.project_id)
            .field("catalog", &self.catalog)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CatalogEntry {
    #[serde(rename = "type")]
    pub(crate) service_type: String,
    #[serde(default)]
    pub(crate) endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CatalogEndpoint {
    pub(crate) interface: String,
    #[serde(default)]
    pub(crate) region: Option<String>,
    #[serde(default)]
    pub(crate) region_id: Option<String>,
    pub(crate) url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Deserialize)]
struct TokenBody {
    user: IdRef,
    #[serde(default)]
    project: Option<IdRef>,
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct IdRef {
    id: String,
}

impl AuthSession {
    /// URL of `service` for the given interface and optional region.
    pub(crate) fn endpoint_for(
        &self,
        service: ServiceType,
        interface: &str,
        region_name: Option<&str>,
    ) -> Result<String> {
        for catalog_type in service.catalog_types() {
            let Some(entry) = self
                .catalog
                .iter()
                .find(|entry| entry.service_type == *catalog_type)
            else {
                continue;
            };

            let endpoint = entry.endpoints.iter().find(|endpoint| {
                endpoint.interface == interface
                    && region_name.is_none_or(|region| {
                        endpoint.region.as_deref() == Some(region)
                            || endpoint.region_id.as_deref() == Some(region)
                    })
            });
            if let Some(endpoint) = endpoint {
                return Ok(endpoint.url.trim_end_matches('/').to_string());
            }
        }

        Err(PurgeError::EndpointNotFound(service.to_string()).into())
    }

    pub(crate) fn has_service(&self, service: ServiceType) -> bool {
        service.catalog_types().iter().any(|catalog_type| {
            self.catalog
                .iter()
                .any(|entry| entry.service_type == *catalog_type && !entry.endpoints.is_empty())
        })
    }
}

/// Keystone v3 base URL (ending with `/v3`) derived from the auth URL.
pub(crate) fn identity_base_url(auth_url: &str) -> String {
    let trimmed = auth_url.trim_end_matches('/');
    if trimmed.ends_with("/v3") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v3")
    }
}

pub(crate) fn build_auth_request(
    credentials: &PasswordCredentials,
    scope: &ProjectScope,
) -> Value {
    let mut user = json!({
        "name": credentials.username,
        "password": credentials.password,
    });
    if let Some(domain_id) = &credentials.user_domain_id {
        user["domain"] = json!({ "id": domain_id });
    } else if let Some(domain_name) = &credentials.user_domain_name {
        user["domain"] = json!({ "name": domain_name });
    }

    let mut auth = json!({
        "identity": {
            "methods": ["password"],
            "password": { "user": user },
        }
    });

    let project = if let Some(project_id) = &scope.project_id {
        Some(json!({ "id": project_id }))
    } else if let Some(project_name) = &scope.project_name {
        let mut project = json!({ "name": project_name });
        if let Some(domain_id) = &scope.project_domain_id {
            project["domain"] = json!({ "id": domain_id });
        } else if let Some(domain_name) = &scope.project_domain_name {
            project["domain"] = json!({ "name": domain_name });
        }
        Some(project)
    } else {
        None
    };
    if let Some(project) = project {
        auth["scope"] = json!({ "project": project });
    }

    json!({ "auth": auth })
}

/// Password authentication against Keystone v3.
pub(crate) async fn authenticate(
    http: &reqwest::Client,
    auth_url: &str,
    credentials: &PasswordCredentials,
    scope: &ProjectScope,
) -> Result<AuthSession> {
    let url = format!("{}/auth/tokens", identity_base_url(auth_url));
    debug!(url = url, username = credentials.username, "authenticating.");

    let response = http
        .post(&url)
        .json(&build_auth_request(credentials, scope))
        .send()
        .await
        .map_err(|e| PurgeError::Connection(e.to_string()))?;
    let response = check_status(response, "authentication").await?;

    let token = response
        .headers()
        .get(SUBJECT_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            PurgeError::AuthenticationFailed("no token in the Keystone response".to_string())
        })?;
    let body: TokenResponse = response
        .json()
        .await
        .context("invalid Keystone token response")?;

    let project_id = body.token.project.map(|project| project.id).ok_or_else(|| {
        PurgeError::AuthenticationFailed("the token is not scoped to a project".to_string())
    })?;

    debug!(
        user_id = body.token.user.id,
        project_id = project_id,
        "authenticated."
    );

    Ok(AuthSession {
        token,
        user_id: body.token.user.id,
        project_id,
        catalog: body.token.catalog,
    })
}
