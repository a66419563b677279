//! Chat API handlers
//!
//! Conversations and messages of the Data Analytics API. Agent and
//! conversation names contain `/`, so both live under a single wildcard
//! route that dispatches on a trailing `/messages`.

use crate::analytics::types::{
    ChatRequest, Conversation, ConversationReference, Credentials, DataAgentContext, Message,
};
use crate::api::utils::{ndjson_response, non_blank, validate_message};
use crate::auth::VerifiedToken;
use crate::chat::format::{format_message, format_timestamp};
use crate::error::AppError;
use crate::state::SharedState;
use async_stream::stream;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Page size used when listing conversations
pub const CONVERSATIONS_PAGE_SIZE: u32 = 100;

const MESSAGES_SUFFIX: &str = "/messages";

/// Conversation as returned to the frontend
#[derive(Debug, Serialize)]
pub struct ConversationView {
    /// Full resource name
    pub name: String,
    /// Creation time (RFC 3339)
    pub create_time: Value,
    /// Last activity (RFC 3339)
    pub last_used_time: Value,
    /// Agents the conversation talks to
    pub agents: Vec<String>,
}

impl From<&Conversation> for ConversationView {
    fn from(conversation: &Conversation) -> Self {
        Self {
            name: conversation.name.clone(),
            create_time: format_timestamp(conversation.create_time.as_ref()),
            last_used_time: format_timestamp(conversation.last_used_time.as_ref()),
            agents: conversation.agents.clone(),
        }
    }
}

/// Conversations list response
#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    /// Conversations of the requested agent
    pub conversations: Vec<ConversationView>,
}

/// Created conversation response
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    /// The new conversation
    pub conversation: ConversationView,
}

/// Message history response
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    /// Formatted messages, oldest first
    pub messages: Vec<Value>,
}

/// `agent_name` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct AgentParams {
    /// Full data agent resource name
    pub agent_name: Option<String>,
}

/// Send message request
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// The user's question
    pub text: String,
}

/// Resource a wildcard path refers to
#[derive(Debug, PartialEq, Eq)]
pub enum ConversationPath<'a> {
    /// `<agent name>`: list that agent's conversations
    Agent(&'a str),
    /// `<conversation name>/messages`
    Messages(&'a str),
}

impl<'a> ConversationPath<'a> {
    /// Classify a wildcard path, ignoring surrounding slashes
    pub fn parse(path: &'a str) -> Self {
        let path = path.trim_matches('/');
        match path.strip_suffix(MESSAGES_SUFFIX) {
            Some(conversation) => Self::Messages(conversation),
            None => Self::Agent(path),
        }
    }
}

/// Whether a conversation belongs to `agent_name`
///
/// Conversations may store the agent by full name or by a shorter form, so
/// the agent id (last path segment) is accepted as well.
pub fn conversation_matches(conversation: &Conversation, agent_name: &str) -> bool {
    let agent_id = agent_name.rsplit('/').next().unwrap_or(agent_name);
    conversation.agents.iter().any(|agent| {
        agent == agent_name || (!agent_id.is_empty() && agent.contains(agent_id))
    })
}

/// GET /api/chat/conversations/*path
///
/// `<agent name>` lists the agent's conversations; `<conversation name>/messages`
/// returns the conversation history.
pub async fn get_conversation_resource(
    State(state): State<SharedState>,
    Path(path): Path<String>,
    verified: VerifiedToken,
) -> Result<Response, AppError> {
    match ConversationPath::parse(&path) {
        ConversationPath::Messages(conversation) => {
            let response = get_messages(&state, &verified.token, conversation).await?;
            Ok(Json(response).into_response())
        }
        ConversationPath::Agent(agent_name) => {
            let response = list_conversations(&state, &verified.token, agent_name).await?;
            Ok(Json(response).into_response())
        }
    }
}

/// POST /api/chat/conversations/*path
///
/// Only `<conversation name>/messages` accepts POST.
pub async fn post_conversation_resource(
    State(state): State<SharedState>,
    Path(path): Path<String>,
    Query(params): Query<AgentParams>,
    verified: VerifiedToken,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response, AppError> {
    match ConversationPath::parse(&path) {
        ConversationPath::Messages(conversation) => {
            send_message(&state, &verified.token, conversation, &params, &request).await
        }
        ConversationPath::Agent(_) => Err(AppError::NotFound("Not Found".to_string())),
    }
}

/// POST /api/chat/conversations?agent_name= - Start a conversation
pub async fn create_conversation(
    State(state): State<SharedState>,
    Query(params): Query<AgentParams>,
    verified: VerifiedToken,
) -> Result<Json<ConversationResponse>, AppError> {
    let agent_name = non_blank(&params.agent_name)
        .ok_or_else(|| AppError::BadRequest("agent_name is required".to_string()))?;

    let conversation = Conversation {
        agents: vec![agent_name.to_string()],
        ..Default::default()
    };
    let created = state
        .analytics
        .create_conversation(&verified.token, &state.config.parent(), &conversation)
        .await
        .map_err(|e| e.context("API error creating conversation"))?;

    tracing::info!(conversation = %created.name, agent = %agent_name, "Created conversation");
    Ok(Json(ConversationResponse {
        conversation: ConversationView::from(&created),
    }))
}

/// Conversations in the project belonging to `agent_name`
///
/// A 403/404 from the API means the caller has no conversations to see and
/// yields an empty list.
pub async fn list_conversations(
    state: &SharedState,
    token: &str,
    agent_name: &str,
) -> Result<ConversationsResponse, AppError> {
    let all = match state
        .analytics
        .list_conversations(token, &state.config.parent(), CONVERSATIONS_PAGE_SIZE)
        .await
    {
        Ok(all) => all,
        Err(e) if matches!(e.upstream_status(), Some(403 | 404)) => {
            tracing::warn!(error = %e, "Conversations not accessible, returning none");
            Vec::new()
        }
        Err(e) => return Err(e.context("API error fetching conversations")),
    };

    let conversations: Vec<ConversationView> = all
        .iter()
        .filter(|c| conversation_matches(c, agent_name))
        .map(ConversationView::from)
        .collect();

    tracing::debug!(
        agent = %agent_name,
        total = all.len(),
        matched = conversations.len(),
        "Listed conversations"
    );
    Ok(ConversationsResponse { conversations })
}

/// Formatted history of a conversation, oldest first
pub async fn get_messages(
    state: &SharedState,
    token: &str,
    conversation: &str,
) -> Result<MessagesResponse, AppError> {
    let mut stored = state
        .analytics
        .list_messages(token, conversation)
        .await
        .map_err(|e| e.context("API error fetching messages"))?;

    // Stable: messages without a timestamp keep their order, first
    stored.sort_by_key(|m| m.message.timestamp);

    Ok(MessagesResponse {
        messages: stored.iter().map(|m| format_message(&m.message)).collect(),
    })
}

/// Send a question and stream the agent's replies as NDJSON
///
/// Only the message text is checked before the response starts. Failures
/// resolving the agent or opening the chat become the last line,
/// `{"error": ...}`.
async fn send_message(
    state: &SharedState,
    token: &str,
    conversation: &str,
    params: &AgentParams,
    request: &SendMessageRequest,
) -> Result<Response, AppError> {
    validate_message(&request.text)?;

    let state = state.clone();
    let token = token.to_string();
    let conversation = conversation.to_string();
    let agent_name = non_blank(&params.agent_name).map(str::to_string);
    let text = request.text.trim().to_string();

    let lines = stream! {
        let replies = open_chat(&state, &token, &conversation, agent_name, text).await;
        let mut replies = match replies {
            Ok(replies) => Box::pin(replies),
            Err(e) => {
                tracing::error!(error = %e, conversation = %conversation, "Chat could not start");
                yield json!({"error": e.to_string()});
                return;
            }
        };
        while let Some(reply) = replies.next().await {
            match reply {
                Ok(message) => yield format_message(&message),
                Err(e) => {
                    tracing::error!(error = %e, "Chat stream failed");
                    yield json!({"error": e.to_string()});
                    break;
                }
            }
        }
    };

    ndjson_response(lines)
}

/// Resolve the agent and open the upstream chat stream
async fn open_chat(
    state: &SharedState,
    token: &str,
    conversation: &str,
    agent_name: Option<String>,
    text: String,
) -> Result<impl futures_util::Stream<Item = Result<Message, AppError>> + Send + 'static, AppError>
{
    let agent_name = match agent_name {
        Some(agent) => agent,
        None => state
            .analytics
            .get_conversation(token, conversation)
            .await
            .map_err(|e| e.context("API error fetching conversation"))?
            .agents
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppError::BadRequest("No agent associated with this conversation".to_string())
            })?,
    };

    let agent = state
        .analytics
        .get_data_agent(token, &agent_name)
        .await
        .map_err(|e| e.context("API error fetching agent"))?;

    let credentials = if agent.is_looker() {
        match state.config.analytics.looker_credentials() {
            Some((client_id, client_secret)) => Some(Credentials::looker(client_id, client_secret)),
            None => {
                tracing::warn!(agent = %agent_name, "Looker agent used without LOOKER_CLIENT_ID/LOOKER_CLIENT_SECRET");
                None
            }
        }
    } else {
        None
    };

    let chat_request = ChatRequest {
        parent: state.config.parent(),
        messages: vec![Message::user(text)],
        conversation_reference: ConversationReference {
            conversation: conversation.to_string(),
            data_agent_context: DataAgentContext {
                data_agent: agent_name.clone(),
                credentials,
            },
        },
    };

    let replies = state.analytics.chat(token, &chat_request).await?;
    tracing::info!(conversation = %conversation, agent = %agent_name, "Streaming chat reply");
    Ok(replies)
}
