//! Metrics control-plane HTTP client
//!
//! Implements the managed metrics REST API. Resources hang off the workspace
//! collection: `/workspaces/{id}/rulegroupsnamespaces/{name}`,
//! `/workspaces/{id}/alertmanager/definition`, `/workspaces/{id}/logging`.
//! Tagging is addressed by resource name under `/tags/{arn}`.
//!
//! Configuration payloads travel base64-encoded on the wire; this client
//! encodes on the way out and decodes on the way in so callers only ever see
//! the plain configuration text.

use crate::error::MetricsError;
use crate::metrics_trait::MetricsClientTrait;
use crate::models::*;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Metrics control-plane API client
pub struct MetricsClient {
    client: Client,
    base_url: String,
    token: String,
}

// Envelope types for the wire format. Describe responses wrap the resource in
// a field named after the kind, and configuration payloads are base64.

#[derive(Deserialize)]
struct DescribeWorkspaceEnvelope {
    workspace: WorkspaceDescription,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListWorkspacesEnvelope {
    workspaces: Vec<WorkspaceSummary>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRuleGroupsNamespace {
    name: String,
    arn: String,
    status: ResourceStatus,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    modified_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeRuleGroupsNamespaceEnvelope {
    rule_groups_namespace: WireRuleGroupsNamespace,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAlertManagerDefinition {
    status: ResourceStatus,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    modified_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeAlertManagerDefinitionEnvelope {
    alert_manager_definition: WireAlertManagerDefinition,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLoggingConfigurationEnvelope {
    logging_configuration: LoggingConfigurationMetadata,
}

impl MetricsClient {
    /// Create a new metrics client
    ///
    /// # Arguments
    /// * `base_url` - Service endpoint (e.g. "https://metrics.example.com")
    /// * `token` - API token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, MetricsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(MetricsError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Classify a non-success response into the error taxonomy.
    async fn classify_error(context: &str, response: Response) -> MetricsError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = format!("{context}: {status} - {body}");
        match status.as_u16() {
            404 => MetricsError::NotFound(detail),
            409 => MetricsError::Conflict(detail),
            429 => MetricsError::Throttled(detail),
            400 => MetricsError::Validation(detail),
            402 => MetricsError::LimitExceeded(detail),
            401 | 403 => MetricsError::AccessDenied(detail),
            _ => MetricsError::Api(detail),
        }
    }

    async fn get(&self, url: &str, context: &str) -> Result<Response, MetricsError> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(MetricsError::Http)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::classify_error(context, response).await)
        }
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        url: &str,
        body: &serde_json::Value,
        context: &str,
    ) -> Result<Response, MetricsError> {
        let response = self
            .client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(MetricsError::Http)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::classify_error(context, response).await)
        }
    }

    async fn delete(&self, url: &str, context: &str) -> Result<(), MetricsError> {
        let response = self
            .client
            .delete(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(MetricsError::Http)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::classify_error(context, response).await)
        }
    }

    fn decode_data(data: Option<String>, context: &str) -> Result<Option<String>, MetricsError> {
        match data {
            None => Ok(None),
            Some(encoded) => {
                let bytes = BASE64
                    .decode(encoded.as_bytes())
                    .map_err(|e| MetricsError::Api(format!("{context}: invalid payload encoding: {e}")))?;
                let text = String::from_utf8(bytes)
                    .map_err(|e| MetricsError::Api(format!("{context}: payload is not UTF-8: {e}")))?;
                Ok(Some(text))
            }
        }
    }
}

#[async_trait::async_trait]
impl MetricsClientTrait for MetricsClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn validate_connectivity(&self) -> Result<(), MetricsError> {
        let url = format!("{}/workspaces?maxResults=1", self.base_url);
        debug!("Validating metrics service connectivity");
        self.get(&url, "validate connectivity").await?;
        debug!("Metrics service reachable and token accepted");
        Ok(())
    }

    async fn create_workspace(
        &self,
        alias: Option<&str>,
        tags: &BTreeMap<String, String>,
    ) -> Result<CreateWorkspaceResponse, MetricsError> {
        let url = format!("{}/workspaces", self.base_url);
        debug!(alias, "Creating workspace");
        let body = serde_json::json!({ "alias": alias, "tags": tags });
        let response = self
            .send_json(reqwest::Method::POST, &url, &body, "create workspace")
            .await?;
        Ok(response.json().await?)
    }

    async fn describe_workspace(&self, workspace_id: &str) -> Result<WorkspaceDescription, MetricsError> {
        let url = format!("{}/workspaces/{}", self.base_url, workspace_id);
        debug!(workspace_id, "Describing workspace");
        let response = self.get(&url, "describe workspace").await?;
        let envelope: DescribeWorkspaceEnvelope = response.json().await?;
        Ok(envelope.workspace)
    }

    async fn list_workspaces(&self, alias: Option<&str>) -> Result<Vec<WorkspaceSummary>, MetricsError> {
        let mut all_results = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut url = format!("{}/workspaces", self.base_url);
            let mut params = Vec::new();
            if let Some(alias) = alias {
                params.push(format!("alias={}", urlencoding::encode(alias)));
            }
            if let Some(token) = &next_token {
                params.push(format!("nextToken={}", urlencoding::encode(token)));
            }
            if !params.is_empty() {
                url = format!("{}?{}", url, params.join("&"));
            }

            debug!("Fetching workspace page: {}", url);
            let response = self.get(&url, "list workspaces").await?;
            let envelope: ListWorkspacesEnvelope = response.json().await?;
            all_results.extend(envelope.workspaces);

            match envelope.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(all_results)
    }

    async fn update_workspace_alias(
        &self,
        workspace_id: &str,
        alias: Option<&str>,
    ) -> Result<(), MetricsError> {
        let url = format!("{}/workspaces/{}/alias", self.base_url, workspace_id);
        debug!(workspace_id, alias, "Updating workspace alias");
        let body = serde_json::json!({ "alias": alias });
        self.send_json(reqwest::Method::POST, &url, &body, "update workspace alias")
            .await?;
        Ok(())
    }

    async fn delete_workspace(&self, workspace_id: &str) -> Result<(), MetricsError> {
        let url = format!("{}/workspaces/{}", self.base_url, workspace_id);
        debug!(workspace_id, "Deleting workspace");
        self.delete(&url, "delete workspace").await
    }

    async fn create_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
        data: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<CreateRuleGroupsNamespaceResponse, MetricsError> {
        let url = format!("{}/workspaces/{}/rulegroupsnamespaces", self.base_url, workspace_id);
        debug!(workspace_id, name, "Creating rule groups namespace");
        let body = serde_json::json!({
            "name": name,
            "data": BASE64.encode(data.as_bytes()),
            "tags": tags,
        });
        let response = self
            .send_json(reqwest::Method::POST, &url, &body, "create rule groups namespace")
            .await?;
        Ok(response.json().await?)
    }

    async fn describe_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
    ) -> Result<RuleGroupsNamespaceDescription, MetricsError> {
        let url = format!(
            "{}/workspaces/{}/rulegroupsnamespaces/{}",
            self.base_url, workspace_id, name
        );
        debug!(workspace_id, name, "Describing rule groups namespace");
        let response = self.get(&url, "describe rule groups namespace").await?;
        let envelope: DescribeRuleGroupsNamespaceEnvelope = response.json().await?;
        let wire = envelope.rule_groups_namespace;
        Ok(RuleGroupsNamespaceDescription {
            data: Self::decode_data(wire.data, "describe rule groups namespace")?,
            name: wire.name,
            arn: wire.arn,
            status: wire.status,
            tags: wire.tags,
            modified_at: wire.modified_at,
        })
    }

    async fn put_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
        data: &str,
    ) -> Result<PutRuleGroupsNamespaceResponse, MetricsError> {
        let url = format!(
            "{}/workspaces/{}/rulegroupsnamespaces/{}",
            self.base_url, workspace_id, name
        );
        debug!(workspace_id, name, "Putting rule groups namespace configuration");
        let body = serde_json::json!({ "data": BASE64.encode(data.as_bytes()) });
        let response = self
            .send_json(reqwest::Method::PUT, &url, &body, "put rule groups namespace")
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_rule_groups_namespace(
        &self,
        workspace_id: &str,
        name: &str,
    ) -> Result<(), MetricsError> {
        let url = format!(
            "{}/workspaces/{}/rulegroupsnamespaces/{}",
            self.base_url, workspace_id, name
        );
        debug!(workspace_id, name, "Deleting rule groups namespace");
        self.delete(&url, "delete rule groups namespace").await
    }

    async fn create_alert_manager_definition(
        &self,
        workspace_id: &str,
        data: &str,
    ) -> Result<CreateAlertManagerDefinitionResponse, MetricsError> {
        let url = format!("{}/workspaces/{}/alertmanager/definition", self.base_url, workspace_id);
        debug!(workspace_id, "Creating alert manager definition");
        let body = serde_json::json!({ "data": BASE64.encode(data.as_bytes()) });
        let response = self
            .send_json(reqwest::Method::POST, &url, &body, "create alert manager definition")
            .await?;
        Ok(response.json().await?)
    }

    async fn describe_alert_manager_definition(
        &self,
        workspace_id: &str,
    ) -> Result<AlertManagerDefinitionDescription, MetricsError> {
        let url = format!("{}/workspaces/{}/alertmanager/definition", self.base_url, workspace_id);
        debug!(workspace_id, "Describing alert manager definition");
        let response = self.get(&url, "describe alert manager definition").await?;
        let envelope: DescribeAlertManagerDefinitionEnvelope = response.json().await?;
        let wire = envelope.alert_manager_definition;
        Ok(AlertManagerDefinitionDescription {
            data: Self::decode_data(wire.data, "describe alert manager definition")?,
            status: wire.status,
            modified_at: wire.modified_at,
        })
    }

    async fn put_alert_manager_definition(
        &self,
        workspace_id: &str,
        data: &str,
    ) -> Result<PutAlertManagerDefinitionResponse, MetricsError> {
        let url = format!("{}/workspaces/{}/alertmanager/definition", self.base_url, workspace_id);
        debug!(workspace_id, "Putting alert manager definition");
        let body = serde_json::json!({ "data": BASE64.encode(data.as_bytes()) });
        let response = self
            .send_json(reqwest::Method::PUT, &url, &body, "put alert manager definition")
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_alert_manager_definition(&self, workspace_id: &str) -> Result<(), MetricsError> {
        let url = format!("{}/workspaces/{}/alertmanager/definition", self.base_url, workspace_id);
        debug!(workspace_id, "Deleting alert manager definition");
        self.delete(&url, "delete alert manager definition").await
    }

    async fn create_logging_configuration(
        &self,
        workspace_id: &str,
        log_group_arn: &str,
    ) -> Result<CreateLoggingConfigurationResponse, MetricsError> {
        let url = format!("{}/workspaces/{}/logging", self.base_url, workspace_id);
        debug!(workspace_id, log_group_arn, "Creating logging configuration");
        let body = serde_json::json!({ "logGroupArn": log_group_arn });
        let response = self
            .send_json(reqwest::Method::POST, &url, &body, "create logging configuration")
            .await?;
        Ok(response.json().await?)
    }

    async fn describe_logging_configuration(
        &self,
        workspace_id: &str,
    ) -> Result<LoggingConfigurationMetadata, MetricsError> {
        let url = format!("{}/workspaces/{}/logging", self.base_url, workspace_id);
        debug!(workspace_id, "Describing logging configuration");
        let response = self.get(&url, "describe logging configuration").await?;
        let envelope: DescribeLoggingConfigurationEnvelope = response.json().await?;
        Ok(envelope.logging_configuration)
    }

    async fn update_logging_configuration(
        &self,
        workspace_id: &str,
        log_group_arn: &str,
    ) -> Result<UpdateLoggingConfigurationResponse, MetricsError> {
        let url = format!("{}/workspaces/{}/logging", self.base_url, workspace_id);
        debug!(workspace_id, log_group_arn, "Updating logging configuration");
        let body = serde_json::json!({ "logGroupArn": log_group_arn });
        let response = self
            .send_json(reqwest::Method::PUT, &url, &body, "update logging configuration")
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_logging_configuration(&self, workspace_id: &str) -> Result<(), MetricsError> {
        let url = format!("{}/workspaces/{}/logging", self.base_url, workspace_id);
        debug!(workspace_id, "Deleting logging configuration");
        self.delete(&url, "delete logging configuration").await
    }

    async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> Result<(), MetricsError> {
        let url = format!("{}/tags/{}", self.base_url, urlencoding::encode(arn));
        debug!(arn, "Tagging resource");
        let body = serde_json::json!({ "tags": tags });
        self.send_json(reqwest::Method::POST, &url, &body, "tag resource")
            .await?;
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, tag_keys: &[String]) -> Result<(), MetricsError> {
        let keys = tag_keys
            .iter()
            .map(|k| format!("tagKeys={}", urlencoding::encode(k)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}/tags/{}?{}", self.base_url, urlencoding::encode(arn), keys);
        debug!(arn, "Untagging resource");
        self.delete(&url, "untag resource").await
    }
}
