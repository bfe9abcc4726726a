//! Preparation and restoration around a purge.
//!
//! Purging another project needs the acting user to hold a role on it, and a
//! disabled project cannot be scoped to. [`PurgeSession::prepare`] grants the
//! role and enables the project; [`PurgeSession::restore`] undoes only what
//! `prepare` changed. Purging the project the credentials are scoped to
//! changes nothing.

use anyhow::Result;
use tracing::{info, warn};

use crate::cloud::{Cloud, Identity};
use crate::config::{Config, PurgeTarget};
use crate::types::error::PurgeError;

pub struct PurgeSession {
    identity: Identity,
    admin_role_name: String,
    project_id: String,
    project_name: Option<String>,
    own_project: bool,
    project_was_disabled: bool,
    role_granted: bool,
}

impl PurgeSession {
    /// Resolve the project to purge.
    ///
    /// Fails with [`PurgeError::ProjectNotFound`] when the named project does
    /// not exist.
    pub async fn new(identity: Identity, config: &Config) -> Result<Self> {
        let (project_id, project_name, own_project, project_was_disabled) = match &config.target
        {
            PurgeTarget::OwnProject => (identity.current_project_id().to_string(), None, true, false),
            PurgeTarget::Project(id_or_name) => {
                let project = identity
                    .find_project(id_or_name)
                    .await?
                    .ok_or_else(|| PurgeError::ProjectNotFound(id_or_name.to_string()))?;
                (project.id, Some(project.name), false, !project.enabled)
            }
        };

        info!(
            project_id = %project_id,
            project_name = project_name.as_deref().unwrap_or_default(),
            "project to purge has been resolved."
        );

        Ok(Self {
            identity,
            admin_role_name: config.admin_role_name.clone(),
            project_id,
            project_name,
            own_project,
            project_was_disabled,
            role_granted: false,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    /// Grant the admin role to the acting user and enable the project.
    pub async fn prepare(&mut self) -> Result<()> {
        if self.own_project {
            return Ok(());
        }

        let user_id = self.identity.current_user_id().to_string();
        self.role_granted = self
            .identity
            .grant_role(&self.admin_role_name, &user_id, &self.project_id)
            .await?;
        if self.role_granted {
            info!(
                role = %self.admin_role_name,
                project_id = %self.project_id,
                "role has been granted on the purged project."
            );
        }

        if self.project_was_disabled {
            self.identity
                .set_project_enabled(&self.project_id, true)
                .await?;
            info!(project_id = %self.project_id, "project has been enabled.");
        }

        Ok(())
    }

    /// Client scoped to the purged project.
    pub async fn connect(&self) -> Result<Cloud> {
        self.identity.connect_project(&self.project_id).await
    }

    /// Delete the purged project. Nothing is left to restore afterwards.
    pub async fn delete_project(&mut self) -> Result<()> {
        if self.own_project {
            return Err(PurgeError::InvalidConfig(
                "the project the credentials are scoped to cannot be deleted".to_string(),
            )
            .into());
        }

        self.identity.delete_project(&self.project_id).await?;
        self.role_granted = false;
        self.project_was_disabled = false;
        info!(
            project_id = %self.project_id,
            project_name = self.project_name.as_deref().unwrap_or_default(),
            "project has been deleted."
        );
        Ok(())
    }

    /// Revoke the granted role and disable the project again if it was
    /// disabled. Both steps are attempted; the first error is returned.
    pub async fn restore(&mut self) -> Result<()> {
        let mut first_error = None;

        if self.role_granted {
            let user_id = self.identity.current_user_id().to_string();
            match self
                .identity
                .revoke_role(&self.admin_role_name, &user_id, &self.project_id)
                .await
            {
                Ok(()) => {
                    self.role_granted = false;
                    info!(
                        role = %self.admin_role_name,
                        project_id = %self.project_id,
                        "role has been revoked."
                    );
                }
                Err(e) => {
                    warn!(error = %e, "failed to revoke role on the purged project.");
                    first_error = Some(e);
                }
            }
        }

        if self.project_was_disabled {
            match self
                .identity
                .set_project_enabled(&self.project_id, false)
                .await
            {
                Ok(()) => {
                    self.project_was_disabled = false;
                    info!(project_id = %self.project_id, "project has been disabled again.");
                }
                Err(e) => {
                    warn!(error = %e, "failed to disable the purged project again.");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
