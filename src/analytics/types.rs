//! Gemini Data Analytics API types
//!
//! Structs that mirror the REST (v1beta) JSON format of the Data Analytics API.
//! Fields the service does not use are either skipped or kept in a flattened
//! map so they survive a round trip to the frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A data agent: a named, published context over BigQuery or Looker data
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataAgent {
    /// Full resource name (`projects/*/locations/*/dataAgents/*`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    /// Last update time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    /// Analytics-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_analytics_agent: Option<DataAnalyticsAgent>,
    /// Fields not modelled here (labels, purge time, ...)
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl DataAgent {
    /// The published context, if any
    pub fn published_context(&self) -> Option<&Context> {
        self.data_analytics_agent
            .as_ref()
            .and_then(|a| a.published_context.as_ref())
    }

    /// Whether the agent reads from a Looker explore
    pub fn is_looker(&self) -> bool {
        self.published_context()
            .and_then(|c| c.datasource_references.as_ref())
            .map(|refs| refs.looker.is_some())
            .unwrap_or(false)
    }
}

/// Analytics-specific part of a data agent
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataAnalyticsAgent {
    /// Context used when chatting with the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_context: Option<Context>,
    /// Draft context not yet published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_context: Option<Context>,
}

/// Agent context: what data it sees and how it should behave
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Instructions prepended to every conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    /// Data sources the agent can query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource_references: Option<DatasourceReferences>,
}

/// Data sources of an agent; exactly one kind is normally set
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceReferences {
    /// BigQuery tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bq: Option<BigQueryTableReferences>,
    /// Looker explores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looker: Option<LookerExploreReferences>,
    /// Looker Studio data sources (passed through untouched)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studio: Option<Value>,
}

/// List of BigQuery tables
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BigQueryTableReferences {
    /// Referenced tables
    #[serde(default)]
    pub table_references: Vec<BigQueryTableReference>,
}

/// A single BigQuery table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BigQueryTableReference {
    /// Project holding the dataset
    pub project_id: String,
    /// Dataset holding the table
    pub dataset_id: String,
    /// Table name
    pub table_id: String,
}

/// List of Looker explores
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LookerExploreReferences {
    /// Referenced explores
    #[serde(default)]
    pub explore_references: Vec<LookerExploreReference>,
}

/// A single Looker explore
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LookerExploreReference {
    /// Base URL of the Looker instance
    pub looker_instance_uri: String,
    /// LookML model
    pub lookml_model: String,
    /// Explore within the model
    pub explore: String,
}

/// A conversation with one or more agents
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Full resource name (`projects/*/locations/*/conversations/*`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Agents taking part in the conversation
    #[serde(default)]
    pub agents: Vec<String>,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    /// Last time a message was sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_time: Option<DateTime<Utc>>,
}

/// A chat message, either from the user or from the system
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// When the message was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Server-assigned id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Set for user messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<UserMessage>,
    /// Set for system (agent) messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<SystemMessage>,
}

impl Message {
    /// Build a user message with the given text
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            user_message: Some(UserMessage { text: text.into() }),
            ..Default::default()
        }
    }
}

/// Text typed by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserMessage {
    /// Message text
    #[serde(default)]
    pub text: String,
}

/// A message produced by the agent; one of the kinds is set
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemMessage {
    /// Plain text answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextMessage>,
    /// Schema resolution step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaMessage>,
    /// Data query step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataMessage>,
    /// Chart generation step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartMessage>,
    /// Error reported by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
    /// Message kinds not modelled here (analysis, example queries, ...)
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Multi-part text
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TextMessage {
    /// Text fragments, concatenated for display
    #[serde(default)]
    pub parts: Vec<String>,
}

/// Schema resolution: either the question being resolved or its result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchemaMessage {
    /// Question the schema is being resolved for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<SchemaQuery>,
    /// Resolved data sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SchemaResult>,
}

/// Question attached to a schema resolution
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchemaQuery {
    /// Natural-language question
    #[serde(default)]
    pub question: String,
}

/// Data sources found during schema resolution
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchemaResult {
    /// Resolved data sources
    #[serde(default)]
    pub datasources: Vec<Datasource>,
}

/// Data retrieval step
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataMessage {
    /// The query being run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<DataQuery>,
    /// SQL generated for the query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_sql: Option<String>,
    /// Rows returned by the query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<DataResult>,
}

/// A named data query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DataQuery {
    /// Query name
    #[serde(default)]
    pub name: String,
    /// Natural-language question
    #[serde(default)]
    pub question: String,
    /// Data sources the query runs against
    #[serde(default)]
    pub datasources: Vec<Datasource>,
}

/// Tabular query result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DataResult {
    /// Column definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Rows keyed by column name
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
}

/// Chart generation step
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChartMessage {
    /// Instructions the chart is being built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<ChartQuery>,
    /// Generated chart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ChartResult>,
}

/// Chart instructions
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChartQuery {
    /// Natural-language chart instructions
    #[serde(default)]
    pub instructions: String,
}

/// Generated chart
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartResult {
    /// Vega-Lite configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vega_config: Option<Value>,
    /// Pre-rendered image, if requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Value>,
}

/// Error reported inside the message stream
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorMessage {
    /// Error text
    #[serde(default)]
    pub text: String,
}

/// A data source referenced by a schema or data message
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    /// BigQuery table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bigquery_table_reference: Option<BigQueryTableReference>,
    /// Looker Studio data source id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studio_datasource_id: Option<String>,
    /// Looker explore
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looker_explore_reference: Option<LookerExploreReference>,
    /// Columns of the data source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Column list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    /// Columns
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A single column
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Field {
    /// Column name
    #[serde(default)]
    pub name: String,
    /// Column type (`STRING`, `INTEGER`, ...)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    /// Column description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Column mode (`NULLABLE`, `REPEATED`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// A message as stored in conversation history
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageMessage {
    /// Server-assigned id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// The message itself
    #[serde(default)]
    pub message: Message,
}

/// Page of data agents
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDataAgentsResponse {
    /// Agents on this page, raw so one malformed agent does not sink the page
    #[serde(default)]
    pub data_agents: Vec<Value>,
    /// Token for the next page, absent on the last page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Page of conversations
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConversationsResponse {
    /// Conversations on this page
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    /// Token for the next page, absent on the last page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Page of stored messages
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    /// Messages on this page
    #[serde(default)]
    pub messages: Vec<StorageMessage>,
    /// Token for the next page, absent on the last page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Long-running operation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    /// Operation resource name
    #[serde(default)]
    pub name: String,
    /// Whether the operation has finished
    #[serde(default)]
    pub done: bool,
    /// Failure status, set when the operation failed
    #[serde(default)]
    pub error: Option<OperationStatus>,
    /// Result, set when the operation succeeded
    #[serde(default)]
    pub response: Option<Value>,
}

/// Failure status of an operation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationStatus {
    /// gRPC status code
    #[serde(default)]
    pub code: i32,
    /// Error message
    #[serde(default)]
    pub message: String,
}

/// Body of a `:chat` call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Project/location the chat runs in
    pub parent: String,
    /// New messages (normally a single user message)
    pub messages: Vec<Message>,
    /// Conversation and agent to chat with
    pub conversation_reference: ConversationReference,
}

/// Points a chat at a stored conversation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    /// Conversation resource name
    pub conversation: String,
    /// Agent answering in the conversation
    pub data_agent_context: DataAgentContext,
}

/// Agent used for a chat, with optional data source credentials
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAgentContext {
    /// Agent resource name
    pub data_agent: String,
    /// Credentials for data sources that need them (Looker)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

/// Data source credentials
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    /// OAuth credentials
    pub oauth: OAuthCredentials,
}

/// OAuth credentials for a data source
#[derive(Debug, Clone, Serialize)]
pub struct OAuthCredentials {
    /// Client id/secret pair
    pub secret: ClientSecret,
}

/// OAuth client id/secret pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSecret {
    /// Client id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
}

impl Credentials {
    /// Build Looker client credentials
    pub fn looker(client_id: &str, client_secret: &str) -> Self {
        Self {
            oauth: OAuthCredentials {
                secret: ClientSecret {
                    client_id: client_id.to_string(),
                    client_secret: client_secret.to_string(),
                },
            },
        }
    }
}
