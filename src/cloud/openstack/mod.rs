//! OpenStack implementation of [`CloudClient`] and [`IdentityClient`] on top
//! of `reqwest`.
//!
//! Endpoints come from the Keystone v3 service catalog of the token. The
//! client speaks the plain REST APIs of Nova, Cinder v3, Neutron, Glance v2,
//! Swift, Heat and Aodh, and only deserializes the fields the purge needs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::cloud::{Cloud, CloudClient, IdentityClient, Project, ServiceType};
use crate::config::{ClientConfig, ProjectScope};
use crate::types::error::{PurgeError, is_not_found_error};
use crate::types::{
    Alarm, Backup, Container, FloatingIp, GroupSnapshot, Image, Network, Port, Router,
    SecurityGroup, Server, Snapshot, Stack, StorageObject, Volume, VolumeGroup,
};

use auth::AuthSession;

pub(crate) mod auth;

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const API_VERSION_HEADER: &str = "OpenStack-API-Version";
// Generic volume groups need 3.13, group snapshots 3.14, backup project ids 3.18.
const VOLUME_GROUP_API_VERSION: &str = "volume 3.14";
const VOLUME_BACKUP_API_VERSION: &str = "volume 3.18";

/// Client bound to one Keystone token.
#[derive(Debug, Clone)]
pub struct OpenStackClient {
    http: reqwest::Client,
    session: Arc<AuthSession>,
    client_config: Arc<ClientConfig>,
}

impl OpenStackClient {
    /// Authenticates with the configured credentials and project scope.
    pub async fn connect(client_config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(client_config.insecure)
            .user_agent(concat!("ospurge-rs/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = client_config.timeout_milliseconds {
            builder = builder.timeout(Duration::from_millis(timeout));
        }
        let http = builder
            .build()
            .map_err(|e| PurgeError::Connection(e.to_string()))?;

        let session = auth::authenticate(
            &http,
            &client_config.auth_url,
            &client_config.credentials,
            &client_config.project_scope,
        )
        .await?;

        Ok(Self::from_session(http, session, client_config.clone()))
    }

    fn from_session(http: reqwest::Client, session: AuthSession, client_config: ClientConfig) -> Self {
        OpenStackClient {
            http,
            session: Arc::new(session),
            client_config: Arc::new(client_config),
        }
    }

    fn endpoint(&self, service: ServiceType) -> Result<String> {
        self.session.endpoint_for(
            service,
            &self.client_config.interface,
            self.client_config.region_name.as_deref(),
        )
    }

    fn identity_url(&self) -> String {
        auth::identity_base_url(&self.client_config.auth_url)
    }

    fn network_url(&self) -> Result<String> {
        let endpoint = self.endpoint(ServiceType::Network)?;
        if endpoint.ends_with("/v2.0") {
            Ok(endpoint)
        } else {
            Ok(format!("{endpoint}/v2.0"))
        }
    }

    /// Glance root, without the API version.
    fn image_root_url(&self) -> Result<String> {
        let endpoint = self.endpoint(ServiceType::Image)?;
        Ok(endpoint
            .strip_suffix("/v2")
            .map(str::to_string)
            .unwrap_or(endpoint))
    }

    fn alarming_url(&self) -> Result<String> {
        let endpoint = self.endpoint(ServiceType::Alarming)?;
        if endpoint.ends_with("/v2") {
            Ok(endpoint)
        } else {
            Ok(format!("{endpoint}/v2"))
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .header(AUTH_TOKEN_HEADER, &self.session.token)
            .send()
            .await
            .map_err(|e| PurgeError::Connection(e.to_string()))?;
        check_status(response, what).await
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self.send(request, what).await?;
        response
            .json()
            .await
            .with_context(|| format!("invalid response while reading {what}"))
    }

    async fn delete(&self, url: &str, what: &str) -> Result<()> {
        trace!(url = url, "DELETE");
        self.send(self.http.delete(url), what).await?;
        Ok(())
    }

    /// Lists `key` from `url`, following the `<key>_links` pagination links.
    async fn list<T: DeserializeOwned>(
        &self,
        url: String,
        key: &str,
        api_version: Option<&str>,
    ) -> Result<Vec<T>> {
        let links_key = format!("{key}_links");
        let mut records = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            trace!(url = url, "GET");
            let mut request = self.http.get(&url);
            if let Some(api_version) = api_version {
                request = request.header(API_VERSION_HEADER, api_version);
            }
            let mut body: Value = self.get_json(request, key).await?;
            records.extend(take_records::<T>(&mut body, key)?);
            next = next_link(&body, &links_key);
        }

        Ok(records)
    }

    async fn list_swift_json<T: DeserializeOwned>(
        &self,
        url: &str,
        marker_of: fn(&T) -> &str,
    ) -> Result<Vec<T>> {
        let mut records: Vec<T> = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.http.get(url).query(&[("format", "json")]);
            if let Some(marker) = &marker {
                request = request.query(&[("marker", marker)]);
            }
            let response = self.send(request, url).await?;
            if response.status() == StatusCode::NO_CONTENT {
                break;
            }
            let page: Vec<T> = response
                .json()
                .await
                .context("invalid object storage listing")?;
            let Some(last) = page.last() else {
                break;
            };
            marker = Some(marker_of(last).to_string());
            records.extend(page);
        }

        Ok(records)
    }

    async fn role_id(&self, role_name: &str) -> Result<String> {
        let url = format!("{}/roles", self.identity_url());
        let roles: Vec<Value> = self
            .list(
                format!("{url}?name={}", urlencoding::encode(role_name)),
                "roles",
                None,
            )
            .await?;
        roles
            .first()
            .and_then(|role| role["id"].as_str())
            .map(str::to_string)
            .ok_or_else(|| PurgeError::NotFound(format!("role {role_name}")).into())
    }

    fn role_assignment_url(&self, role_id: &str, user_id: &str, project_id: &str) -> String {
        format!(
            "{}/projects/{project_id}/users/{user_id}/roles/{role_id}",
            self.identity_url()
        )
    }
}

/// Maps an HTTP error status to a [`PurgeError`].
pub(crate) async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    let error = match status {
        StatusCode::UNAUTHORIZED => PurgeError::AuthenticationFailed(format!("{what}: {message}")),
        StatusCode::FORBIDDEN => PurgeError::NotAuthorized(format!("{what}: {message}")),
        StatusCode::NOT_FOUND => PurgeError::NotFound(what.to_string()),
        _ => PurgeError::Api {
            status: status.as_u16(),
            message: format!("{what}: {message}"),
        },
    };
    Err(error.into())
}

fn take_records<T: DeserializeOwned>(body: &mut Value, key: &str) -> Result<Vec<T>> {
    match body.get_mut(key).map(Value::take) {
        Some(items @ Value::Array(_)) => {
            serde_json::from_value(items).with_context(|| format!("invalid {key} record"))
        }
        _ => Ok(Vec::new()),
    }
}

fn next_link(body: &Value, links_key: &str) -> Option<String> {
    body.get(links_key)?
        .as_array()?
        .iter()
        .find(|link| link["rel"] == "next")
        .and_then(|link| link["href"].as_str())
        .map(str::to_string)
}

fn container_marker(container: &Container) -> &str {
    &container.name
}

fn object_marker(object: &StorageObject) -> &str {
    &object.name
}

fn project_filter(project_id: &str) -> String {
    format!("project_id={}", urlencoding::encode(project_id))
}

#[async_trait]
impl CloudClient for OpenStackClient {
    fn has_service(&self, service: ServiceType) -> bool {
        self.session.has_service(service)
    }

    async fn supports_volume_groups(&self) -> Result<bool> {
        if !self.has_service(ServiceType::Volume) {
            return Ok(false);
        }
        Ok(self.endpoint(ServiceType::Volume)?.contains("/v3"))
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        let url = format!("{}/servers/detail", self.endpoint(ServiceType::Compute)?);
        self.list(url, "servers", None).await
    }

    async fn delete_server(&self, id: &str) -> Result<()> {
        let url = format!("{}/servers/{id}", self.endpoint(ServiceType::Compute)?);
        self.delete(&url, &format!("server {id}")).await
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>> {
        let url = format!("{}/volumes/detail", self.endpoint(ServiceType::Volume)?);
        self.list(url, "volumes", None).await
    }

    async fn get_volume(&self, id: &str) -> Result<Volume> {
        let url = format!("{}/volumes/{id}", self.endpoint(ServiceType::Volume)?);
        let mut body: Value = self
            .get_json(self.http.get(&url), &format!("volume {id}"))
            .await?;
        serde_json::from_value(body["volume"].take()).context("invalid volume record")
    }

    async fn delete_volume(&self, id: &str) -> Result<()> {
        let url = format!("{}/volumes/{id}", self.endpoint(ServiceType::Volume)?);
        self.delete(&url, &format!("volume {id}")).await
    }

    async fn list_volume_snapshots(&self) -> Result<Vec<Snapshot>> {
        let url = format!("{}/snapshots/detail", self.endpoint(ServiceType::Volume)?);
        self.list(url, "snapshots", None).await
    }

    async fn delete_volume_snapshot(&self, id: &str) -> Result<()> {
        let url = format!("{}/snapshots/{id}", self.endpoint(ServiceType::Volume)?);
        self.delete(&url, &format!("volume snapshot {id}")).await
    }

    async fn list_volume_backups(&self) -> Result<Vec<Backup>> {
        let url = format!("{}/backups/detail", self.endpoint(ServiceType::Volume)?);
        self.list(url, "backups", Some(VOLUME_BACKUP_API_VERSION))
            .await
    }

    async fn delete_volume_backup(&self, id: &str) -> Result<()> {
        let url = format!("{}/backups/{id}", self.endpoint(ServiceType::Volume)?);
        self.delete(&url, &format!("volume backup {id}")).await
    }

    async fn list_volume_groups(&self) -> Result<Vec<VolumeGroup>> {
        let url = format!("{}/groups/detail", self.endpoint(ServiceType::Volume)?);
        self.list(url, "groups", Some(VOLUME_GROUP_API_VERSION))
            .await
    }

    async fn delete_volume_group(&self, id: &str, delete_volumes: bool) -> Result<()> {
        let url = format!("{}/groups/{id}/action", self.endpoint(ServiceType::Volume)?);
        let request = self
            .http
            .post(&url)
            .header(API_VERSION_HEADER, VOLUME_GROUP_API_VERSION)
            .json(&json!({ "delete": { "delete-volumes": delete_volumes } }));
        self.send(request, &format!("volume group {id}")).await?;
        Ok(())
    }

    async fn list_group_snapshots(&self) -> Result<Vec<GroupSnapshot>> {
        let url = format!(
            "{}/group_snapshots/detail",
            self.endpoint(ServiceType::Volume)?
        );
        self.list(url, "group_snapshots", Some(VOLUME_GROUP_API_VERSION))
            .await
    }

    async fn delete_group_snapshot(&self, id: &str) -> Result<()> {
        let url = format!(
            "{}/group_snapshots/{id}",
            self.endpoint(ServiceType::Volume)?
        );
        let request = self
            .http
            .delete(&url)
            .header(API_VERSION_HEADER, VOLUME_GROUP_API_VERSION);
        self.send(request, &format!("group snapshot {id}")).await?;
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        let root = self.image_root_url()?;
        let mut images = Vec::new();
        let mut next = Some("/v2/images".to_string());

        while let Some(path) = next.take() {
            let url = format!("{root}{path}");
            trace!(url = url, "GET");
            let mut body: Value = self.get_json(self.http.get(&url), "images").await?;
            images.extend(take_records::<Image>(&mut body, "images")?);
            next = body["next"].as_str().map(str::to_string);
        }

        Ok(images)
    }

    async fn delete_image(&self, id: &str) -> Result<()> {
        let url = format!("{}/v2/images/{id}", self.image_root_url()?);
        self.delete(&url, &format!("image {id}")).await
    }

    async fn list_networks(&self, project_id: &str) -> Result<Vec<Network>> {
        let url = format!(
            "{}/networks?{}",
            self.network_url()?,
            project_filter(project_id)
        );
        self.list(url, "networks", None).await
    }

    async fn delete_network(&self, id: &str) -> Result<()> {
        let url = format!("{}/networks/{id}", self.network_url()?);
        self.delete(&url, &format!("network {id}")).await
    }

    async fn list_ports(&self, project_id: &str, device_owners: &[&str]) -> Result<Vec<Port>> {
        let mut url = format!("{}/ports?{}", self.network_url()?, project_filter(project_id));
        for device_owner in device_owners {
            url.push_str(&format!(
                "&device_owner={}",
                urlencoding::encode(device_owner)
            ));
        }
        self.list(url, "ports", None).await
    }

    async fn delete_port(&self, id: &str) -> Result<()> {
        let url = format!("{}/ports/{id}", self.network_url()?);
        self.delete(&url, &format!("port {id}")).await
    }

    async fn list_routers(&self, project_id: &str) -> Result<Vec<Router>> {
        let url = format!(
            "{}/routers?{}",
            self.network_url()?,
            project_filter(project_id)
        );
        self.list(url, "routers", None).await
    }

    async fn delete_router(&self, id: &str) -> Result<()> {
        let url = format!("{}/routers/{id}", self.network_url()?);
        self.delete(&url, &format!("router {id}")).await
    }

    async fn remove_router_interface(&self, router_id: &str, port_id: &str) -> Result<()> {
        let url = format!(
            "{}/routers/{router_id}/remove_router_interface",
            self.network_url()?
        );
        let request = self.http.put(&url).json(&json!({ "port_id": port_id }));
        self.send(request, &format!("interface {port_id} of router {router_id}"))
            .await?;
        Ok(())
    }

    async fn list_floating_ips(&self, project_id: &str) -> Result<Vec<FloatingIp>> {
        let url = format!(
            "{}/floatingips?{}",
            self.network_url()?,
            project_filter(project_id)
        );
        self.list(url, "floatingips", None).await
    }

    async fn delete_floating_ip(&self, id: &str) -> Result<()> {
        let url = format!("{}/floatingips/{id}", self.network_url()?);
        self.delete(&url, &format!("floating ip {id}")).await
    }

    async fn list_security_groups(&self, project_id: &str) -> Result<Vec<SecurityGroup>> {
        let url = format!(
            "{}/security-groups?{}",
            self.network_url()?,
            project_filter(project_id)
        );
        self.list(url, "security_groups", None).await
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        let url = format!("{}/security-groups/{id}", self.network_url()?);
        self.delete(&url, &format!("security group {id}")).await
    }

    async fn list_stacks(&self) -> Result<Vec<Stack>> {
        let url = format!("{}/stacks", self.endpoint(ServiceType::Orchestration)?);
        self.list(url, "stacks", None).await
    }

    async fn delete_stack(&self, name: &str, id: &str) -> Result<()> {
        let url = format!(
            "{}/stacks/{}/{id}",
            self.endpoint(ServiceType::Orchestration)?,
            urlencoding::encode(name)
        );
        let what = format!("stack {name}");
        self.delete(&url, &what).await?;

        let stack_delete_config = self.client_config.stack_delete_config;
        let poll_interval = Duration::from_millis(stack_delete_config.poll_interval_milliseconds);
        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(stack_delete_config.timeout_milliseconds);
        loop {
            let result: Result<Value> = self.get_json(self.http.get(&url), &what).await;
            let body = match result {
                Err(e) if is_not_found_error(&e) => return Ok(()),
                result => result?,
            };

            match body["stack"]["stack_status"].as_str() {
                Some("DELETE_COMPLETE") => return Ok(()),
                Some("DELETE_FAILED") => {
                    return Err(PurgeError::Api {
                        status: StatusCode::CONFLICT.as_u16(),
                        message: format!(
                            "{what}: {}",
                            body["stack"]["stack_status_reason"]
                                .as_str()
                                .unwrap_or("DELETE_FAILED")
                        ),
                    }
                    .into());
                }
                status => debug!(stack = name, status = status, "waiting for stack deletion."),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(PurgeError::Api {
                    status: StatusCode::REQUEST_TIMEOUT.as_u16(),
                    message: format!("{what}: deletion did not complete"),
                }
                .into());
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn list_containers(&self) -> Result<Vec<Container>> {
        let url = self.endpoint(ServiceType::ObjectStore)?;
        self.list_swift_json(&url, container_marker).await
    }

    async fn list_objects(&self, container: &str) -> Result<Vec<StorageObject>> {
        let url = format!(
            "{}/{}",
            self.endpoint(ServiceType::ObjectStore)?,
            urlencoding::encode(container)
        );
        let mut objects = self
            .list_swift_json(&url, object_marker)
            .await?;
        for object in &mut objects {
            object.container_name = container.to_string();
        }
        Ok(objects)
    }

    async fn delete_object(&self, container: &str, name: &str) -> Result<()> {
        let url = format!(
            "{}/{}/{}",
            self.endpoint(ServiceType::ObjectStore)?,
            urlencoding::encode(container),
            urlencoding::encode(name)
        );
        self.delete(&url, &format!("object {name} in container {container}"))
            .await
    }

    async fn delete_container(&self, name: &str) -> Result<()> {
        let url = format!(
            "{}/{}",
            self.endpoint(ServiceType::ObjectStore)?,
            urlencoding::encode(name)
        );
        self.delete(&url, &format!("container {name}")).await
    }

    async fn list_alarms(&self, project_id: &str) -> Result<Vec<Alarm>> {
        let url = format!("{}/alarms", self.alarming_url()?);
        let request = self.http.get(&url).query(&[
            ("q.field", "project_id"),
            ("q.op", "eq"),
            ("q.value", project_id),
        ]);
        self.get_json(request, "alarms").await
    }

    async fn delete_alarm(&self, id: &str) -> Result<()> {
        let url = format!("{}/alarms/{id}", self.alarming_url()?);
        self.delete(&url, &format!("alarm {id}")).await
    }
}

#[async_trait]
impl IdentityClient for OpenStackClient {
    fn current_user_id(&self) -> &str {
        &self.session.user_id
    }

    fn current_project_id(&self) -> &str {
        &self.session.project_id
    }

    async fn find_project(&self, id_or_name: &str) -> Result<Option<Project>> {
        let url = format!("{}/projects/{id_or_name}", self.identity_url());
        let result: Result<Value> = self
            .get_json(self.http.get(&url), &format!("project {id_or_name}"))
            .await;
        match result {
            Ok(mut body) => {
                let project = serde_json::from_value(body["project"].take())
                    .context("invalid project record")?;
                return Ok(Some(project));
            }
            Err(e) if is_not_found_error(&e) => {}
            Err(e) => return Err(e),
        }

        let url = format!(
            "{}/projects?name={}",
            self.identity_url(),
            urlencoding::encode(id_or_name)
        );
        let projects: Vec<Project> = self.list(url, "projects", None).await?;
        Ok(projects.into_iter().next())
    }

    async fn grant_role(&self, role_name: &str, user_id: &str, project_id: &str) -> Result<bool> {
        let role_id = self.role_id(role_name).await?;
        let url = self.role_assignment_url(&role_id, user_id, project_id);

        let existing = self
            .send(self.http.head(&url), &format!("role {role_name}"))
            .await;
        match existing {
            Ok(_) => return Ok(false),
            Err(e) if is_not_found_error(&e) => {}
            Err(e) => return Err(e),
        }

        self.send(self.http.put(&url), &format!("role {role_name}"))
            .await?;
        Ok(true)
    }

    async fn revoke_role(&self, role_name: &str, user_id: &str, project_id: &str) -> Result<()> {
        let role_id = self.role_id(role_name).await?;
        let url = self.role_assignment_url(&role_id, user_id, project_id);
        self.delete(&url, &format!("role {role_name}")).await
    }

    async fn set_project_enabled(&self, project_id: &str, enabled: bool) -> Result<()> {
        let url = format!("{}/projects/{project_id}", self.identity_url());
        let request = self
            .http
            .patch(&url)
            .json(&json!({ "project": { "enabled": enabled } }));
        self.send(request, &format!("project {project_id}")).await?;
        Ok(())
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        let url = format!("{}/projects/{project_id}", self.identity_url());
        self.delete(&url, &format!("project {project_id}")).await
    }

    async fn connect_project(&self, project_id: &str) -> Result<Cloud> {
        if project_id == self.session.project_id {
            return Ok(Box::new(self.clone()));
        }

        let scope = ProjectScope {
            project_id: Some(project_id.to_string()),
            ..ProjectScope::default()
        };
        let session = auth::authenticate(
            &self.http,
            &self.client_config.auth_url,
            &self.client_config.credentials,
            &scope,
        )
        .await?;

        let mut client_config = (*self.client_config).clone();
        client_config.project_scope = scope;
        Ok(Box::new(Self::from_session(
            self.http.clone(),
            session,
            client_config,
        )))
    }
}
