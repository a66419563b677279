//! Gemini Data Analytics REST client
//!
//! Thin HTTP client over the `v1beta` REST surface. Every call is made on
//! behalf of the signed-in user, with their Google access token as Bearer
//! credentials. A single `reqwest::Client` is shared (connection pooling).

use crate::analytics::stream::JsonStreamDecoder;
use crate::analytics::types::{
    ChatRequest, Conversation, DataAgent, ListConversationsResponse, ListDataAgentsResponse,
    ListMessagesResponse, Message, Operation, StorageMessage,
};
use crate::config::AnalyticsConfig;
use crate::error::AppError;
use anyhow::anyhow;
use async_stream::stream;
use futures_util::{Stream, StreamExt};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A page of a list call
trait Page: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

impl Page for ListDataAgentsResponse {
    type Item = DataAgent;

    fn into_parts(self) -> (Vec<DataAgent>, Option<String>) {
        let agents = self
            .data_agents
            .into_iter()
            .filter_map(|raw| {
                let name = raw
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or_default()
                    .to_string();
                match serde_json::from_value::<DataAgent>(raw) {
                    Ok(agent) => Some(agent),
                    Err(e) => {
                        tracing::warn!(agent = %name, error = %e, "Skipping unreadable data agent");
                        None
                    }
                }
            })
            .collect();
        (agents, self.next_page_token)
    }
}

impl Page for ListConversationsResponse {
    type Item = Conversation;

    fn into_parts(self) -> (Vec<Conversation>, Option<String>) {
        (self.conversations, self.next_page_token)
    }
}

impl Page for ListMessagesResponse {
    type Item = StorageMessage;

    fn into_parts(self) -> (Vec<StorageMessage>, Option<String>) {
        (self.messages, self.next_page_token)
    }
}

/// Client for data agents, conversations and chat
#[derive(Debug, Clone)]
pub struct DataAnalyticsClient {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl DataAnalyticsClient {
    /// Create a client using the shared HTTP client
    pub fn new(http: reqwest::Client, config: &AnalyticsConfig) -> Self {
        Self {
            http,
            base_url: config.api_base_url.clone(),
            poll_interval: Duration::from_millis(config.operation_poll_interval_ms),
            max_polls: config.operation_max_polls,
        }
    }

    /// List every data agent under `parent`
    pub async fn list_data_agents(
        &self,
        token: &str,
        parent: &str,
    ) -> Result<Vec<DataAgent>, AppError> {
        let path = format!("{}/dataAgents", parent);
        self.list_all::<ListDataAgentsResponse>(token, &path, &[])
            .await
    }

    /// Fetch a single data agent by resource name
    pub async fn get_data_agent(&self, token: &str, name: &str) -> Result<DataAgent, AppError> {
        let url = self.resource_url(name)?;
        send_json(self.http.get(url).bearer_auth(token)).await
    }

    /// Create a data agent and wait for the operation to finish
    pub async fn create_data_agent(
        &self,
        token: &str,
        parent: &str,
        agent_id: &str,
        agent: &DataAgent,
    ) -> Result<DataAgent, AppError> {
        let url = self.resource_url(&format!("{}/dataAgents", parent))?;
        let operation: Operation = send_json(
            self.http
                .post(url)
                .bearer_auth(token)
                .query(&[("dataAgentId", agent_id)])
                .json(agent),
        )
        .await?;

        let operation = self.wait_operation(token, operation).await?;
        agent_from_operation(operation).unwrap_or_else(|| Ok(agent.clone()))
    }

    /// Patch a data agent; `update_mask` lists the fields to overwrite
    pub async fn update_data_agent(
        &self,
        token: &str,
        agent: &DataAgent,
        update_mask: &str,
    ) -> Result<DataAgent, AppError> {
        let url = self.resource_url(&agent.name)?;
        let operation: Operation = send_json(
            self.http
                .patch(url)
                .bearer_auth(token)
                .query(&[("updateMask", update_mask)])
                .json(agent),
        )
        .await?;

        let operation = self.wait_operation(token, operation).await?;
        agent_from_operation(operation).unwrap_or_else(|| Ok(agent.clone()))
    }

    /// Delete a data agent and wait for the operation to finish
    pub async fn delete_data_agent(&self, token: &str, name: &str) -> Result<(), AppError> {
        let url = self.resource_url(name)?;
        let operation: Operation = send_json(self.http.delete(url).bearer_auth(token)).await?;
        self.wait_operation(token, operation).await?;
        Ok(())
    }

    /// List every conversation under `parent`, `page_size` at a time
    pub async fn list_conversations(
        &self,
        token: &str,
        parent: &str,
        page_size: u32,
    ) -> Result<Vec<Conversation>, AppError> {
        let path = format!("{}/conversations", parent);
        self.list_all::<ListConversationsResponse>(
            token,
            &path,
            &[("pageSize", page_size.to_string())],
        )
        .await
    }

    /// Fetch a single conversation by resource name
    pub async fn get_conversation(
        &self,
        token: &str,
        name: &str,
    ) -> Result<Conversation, AppError> {
        let url = self.resource_url(name)?;
        send_json(self.http.get(url).bearer_auth(token)).await
    }

    /// Create a conversation under `parent`
    pub async fn create_conversation(
        &self,
        token: &str,
        parent: &str,
        conversation: &Conversation,
    ) -> Result<Conversation, AppError> {
        let url = self.resource_url(&format!("{}/conversations", parent))?;
        send_json(self.http.post(url).bearer_auth(token).json(conversation)).await
    }

    /// List the stored messages of a conversation
    pub async fn list_messages(
        &self,
        token: &str,
        conversation: &str,
    ) -> Result<Vec<StorageMessage>, AppError> {
        let path = format!("{}/messages", conversation);
        self.list_all::<ListMessagesResponse>(token, &path, &[])
            .await
    }

    /// Send a chat request and stream back the agent's messages
    ///
    /// Errors before the first byte (bad token, unknown agent) are returned
    /// directly; errors after that are yielded by the stream.
    pub async fn chat(
        &self,
        token: &str,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = Result<Message, AppError>> + Send + 'static, AppError> {
        let url = format!("{}:chat", self.resource_url(&request.parent)?);
        tracing::debug!(
            url = %url,
            conversation = %request.conversation_reference.conversation,
            "Starting chat stream"
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let mut body = response.bytes_stream();
        Ok(stream! {
            let mut decoder = JsonStreamDecoder::new();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AppError::from(e));
                        return;
                    }
                };
                match decoder.push(&chunk) {
                    Ok(values) => {
                        for value in values {
                            yield serde_json::from_value::<Message>(value).map_err(|e| {
                                AppError::Internal(anyhow!("Failed to parse chat message: {}", e))
                            });
                        }
                    }
                    Err(e) => {
                        yield Err(AppError::Internal(e.into()));
                        return;
                    }
                }
            }
            if let Err(e) = decoder.finish() {
                yield Err(AppError::Internal(e.into()));
            }
        })
    }

    /// Poll a long-running operation until it is done
    async fn wait_operation(
        &self,
        token: &str,
        mut operation: Operation,
    ) -> Result<Operation, AppError> {
        let mut polls = 0;
        loop {
            if operation.done {
                if let Some(status) = operation.error {
                    return Err(AppError::Upstream {
                        status: grpc_to_http_status(status.code),
                        message: status.message,
                    });
                }
                return Ok(operation);
            }
            if polls >= self.max_polls {
                return Err(AppError::OperationTimeout(operation.name));
            }

            tokio::time::sleep(self.poll_interval).await;
            polls += 1;
            tracing::debug!(operation = %operation.name, polls, "Polling operation");

            let url = self.resource_url(&operation.name)?;
            operation = send_json(self.http.get(url).bearer_auth(token)).await?;
        }
    }

    /// Fetch every page of a list call
    async fn list_all<P: Page>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<P::Item>, AppError> {
        let url = self.resource_url(path)?;
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url).bearer_auth(token).query(query);
            if let Some(page_token) = &page_token {
                request = request.query(&[("pageToken", page_token)]);
            }

            let page: P = send_json(request).await?;
            let (page_items, next) = page.into_parts();
            items.extend(page_items);

            match next.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(items)
    }

    /// Build the URL of a resource name, rejecting names that would escape it
    fn resource_url(&self, name: &str) -> Result<String, AppError> {
        let name = name.trim_matches('/');
        if name.is_empty()
            || name.split('/').any(|segment| segment.is_empty() || segment == "..")
            || name.contains(['?', '#'])
        {
            return Err(AppError::BadRequest(format!(
                "Invalid resource name: {}",
                name
            )));
        }
        Ok(format!("{}/{}", self.base_url, name))
    }
}

/// Send a request and decode a JSON body, mapping error statuses
async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AppError> {
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(upstream_error(response).await);
    }

    let body = response.text().await?;
    // DELETE and some operations answer with an empty body
    let body = if body.trim().is_empty() { "{}" } else { &body };
    serde_json::from_str(body).map_err(|e| {
        AppError::Internal(anyhow!(
            "Failed to parse JSON response from Data Analytics API: {}",
            e
        ))
    })
}

/// Turn an error response into `AppError::Upstream`
async fn upstream_error(response: Response) -> AppError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);

    tracing::error!(
        status_code = status,
        error_body = %message,
        "Data Analytics API returned error status"
    );

    AppError::Upstream { status, message }
}

/// Extract the agent carried by a finished operation
fn agent_from_operation(operation: Operation) -> Option<Result<DataAgent, AppError>> {
    let mut response = operation.response?;
    if let Some(map) = response.as_object_mut() {
        map.remove("@type");
        if map.is_empty() {
            return None;
        }
    }
    Some(serde_json::from_value(response).map_err(|e| {
        AppError::Internal(anyhow!("Failed to parse operation response: {}", e))
    }))
}

/// Map a google.rpc status code to the matching HTTP status
fn grpc_to_http_status(code: i32) -> u16 {
    match code {
        3 | 9 | 11 => 400,
        16 => 401,
        7 => 403,
        5 => 404,
        6 | 10 => 409,
        8 => 429,
        1 => 499,
        4 => 504,
        12 => 501,
        14 => 503,
        _ => 500,
    }
}
