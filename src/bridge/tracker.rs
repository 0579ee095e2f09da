//! Client for the external issue tracker.
//!
//! Ticket creation goes through an internal gateway that accepts the ticket
//! fields as query parameters; status lookups hit the Jira REST API directly.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::TrackerSection;
use crate::errors::TrackerError;

/// Outbound ticket-creation payload. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRequest {
    pub project_id: String,
    pub issue_type: String,
    pub assignee: String,
    pub reporter: String,
    pub content: String,
}

/// Ticket-creation response.
#[derive(Debug, Deserialize)]
pub struct ResponseJira {
    #[serde(default)]
    pub id: String,
}

/// Jira issue document; only `fields.status` is read.
#[derive(Debug, Deserialize)]
pub struct IssueResponse {
    pub fields: IssueFields,
}

#[derive(Debug, Deserialize)]
pub struct IssueFields {
    pub status: RemoteStatus,
}

#[derive(Debug, Deserialize)]
pub struct RemoteStatus {
    #[serde(default)]
    pub name: String,
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Create a ticket and return its tracker ID.
    async fn create_ticket(&self, ticket: &TicketRequest) -> Result<String, TrackerError>;

    /// Fetch the current status name of a ticket.
    async fn fetch_status(&self, ticket_id: &str) -> Result<String, TrackerError>;

    /// Status name, or `None` on any failure. Failures are logged, not raised.
    async fn current_status(&self, ticket_id: &str) -> Option<String> {
        match self.fetch_status(ticket_id).await {
            Ok(name) if !name.is_empty() => Some(name),
            Ok(_) => {
                warn!(ticket_id, "tracker returned an empty status name");
                None
            }
            Err(e) => {
                warn!(ticket_id, error = %e, "failed to fetch tracker status");
                None
            }
        }
    }
}

/// HTTP implementation of [`IssueTracker`].
pub struct JiraClient {
    http: reqwest::Client,
    create_url: String,
    jira_url: String,
    environment: String,
}

impl JiraClient {
    pub fn new(config: &TrackerSection) -> Result<Self, TrackerError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(TrackerError::Request)?;
        Ok(Self {
            http,
            create_url: config.create_url.clone(),
            jira_url: config.jira_url.trim_end_matches('/').to_string(),
            environment: config.environment.clone(),
        })
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn create_ticket(&self, ticket: &TicketRequest) -> Result<String, TrackerError> {
        debug!(project_id = %ticket.project_id, "creating tracker ticket");
        let resp = self
            .http
            .post(&self.create_url)
            .query(&[
                ("project_id", ticket.project_id.as_str()),
                ("issuetype", ticket.issue_type.as_str()),
                ("assignee", ticket.assignee.as_str()),
                ("reporter", ticket.reporter.as_str()),
                ("content", ticket.content.as_str()),
                ("summary", ticket.content.as_str()),
                ("environment", self.environment.as_str()),
            ])
            .send()
            .await
            .map_err(TrackerError::Request)?;

        if !resp.status().is_success() {
            return Err(TrackerError::Status {
                status: resp.status().as_u16(),
            });
        }

        let body: ResponseJira = resp.json().await.map_err(TrackerError::Decode)?;
        if body.id.is_empty() {
            return Err(TrackerError::MissingTicketId);
        }
        Ok(body.id)
    }

    async fn fetch_status(&self, ticket_id: &str) -> Result<String, TrackerError> {
        let url = format!("{}/rest/api/2/issue/{}", self.jira_url, ticket_id);
        let resp = self
            .http
            .get(&url)
            .query(&[("fields", "status")])
            .send()
            .await
            .map_err(TrackerError::Request)?;

        if !resp.status().is_success() {
            return Err(TrackerError::Status {
                status: resp.status().as_u16(),
            });
        }

        let body: IssueResponse = resp.json().await.map_err(TrackerError::Decode)?;
        Ok(body.fields.status.name)
    }
}
