//! User notifications.
//!
//! The REST side of the `notification` realtime event: list the current
//! user's notifications, create new ones and mark them read.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    error::SdkResult,
    transport::{ApiRequest, Transport, fetch},
};

const LIST_PATH: &str = "/api/notifications/list";
const CREATE_PATH: &str = "/api/notifications/new";
const READ_PATH: &str = "/api/notifications/read";
const READ_ALL_PATH: &str = "/api/notifications/read-all";

/// Kind of a stored notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
    Success,
}

/// Severity requested when creating a notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Success,
}

/// A notification addressed to the current user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

/// Body of a create request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotification {
    pub key: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl CreateNotification {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    #[must_use]
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

/// The per-user read marker returned by [`Notifications::mark_as_read`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReceipt {
    pub id: String,
    pub fk_user_id: String,
    pub fk_notification_id: String,
    pub is_read: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Notifications API.
#[derive(Clone)]
pub struct Notifications {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Notifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifications").finish_non_exhaustive()
    }
}

impl Notifications {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// List the current user's notifications.
    ///
    /// # Errors
    ///
    /// Propagates transport and decoding errors.
    pub async fn list(&self) -> SdkResult<Vec<Notification>> {
        fetch(self.transport.as_ref(), ApiRequest::get(LIST_PATH)).await
    }

    /// Create a notification. The platform's reply is returned as-is.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn create(&self, request: &CreateNotification) -> SdkResult<Value> {
        self.transport
            .send(ApiRequest::post(CREATE_PATH).json(request)?)
            .await
    }

    /// Mark one user notification as read.
    ///
    /// # Errors
    ///
    /// Propagates transport and decoding errors.
    pub async fn mark_as_read(&self, user_notification_id: &str) -> SdkResult<NotificationReceipt> {
        let request =
            ApiRequest::post(READ_PATH).body(json!({ "userNotificationId": user_notification_id }));
        fetch(self.transport.as_ref(), request).await
    }

    /// Mark every notification of the current user as read.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn mark_all_as_read(&self) -> SdkResult<()> {
        self.transport
            .send(ApiRequest::post(READ_ALL_PATH).body(json!({})))
            .await?;
        Ok(())
    }
}
