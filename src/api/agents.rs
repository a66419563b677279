//! Data agent management API handlers
//!
//! Thin proxy over the Data Analytics API: list, create, update and delete
//! data agents in the configured project with the caller's token.

use crate::analytics::types::{
    BigQueryTableReference, BigQueryTableReferences, Context, DataAgent, DataAnalyticsAgent,
    DatasourceReferences, LookerExploreReference, LookerExploreReferences,
};
use crate::api::utils::{non_blank, MessageResponse};
use crate::auth::BearerToken;
use crate::chat::format::format_timestamp;
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Fields overwritten by an update; datasource references are resent unchanged
pub const UPDATE_MASK: &str = "displayName,description,dataAnalyticsAgent.publishedContext";

/// Agents list response
#[derive(Debug, Serialize)]
pub struct AgentsListResponse {
    /// Agents with their published context flattened in
    pub agents: Vec<Value>,
}

/// Short agent description returned after a mutation
#[derive(Debug, Serialize)]
pub struct AgentSummary {
    /// Full resource name
    pub name: String,
    /// Display name
    pub display_name: Option<String>,
    /// Description
    pub description: Option<String>,
}

impl From<&DataAgent> for AgentSummary {
    fn from(agent: &DataAgent) -> Self {
        Self {
            name: agent.name.clone(),
            display_name: agent.display_name.clone(),
            description: agent.description.clone(),
        }
    }
}

/// Create/update response
#[derive(Debug, Serialize)]
pub struct AgentMutationResponse {
    /// Human-readable outcome
    pub message: String,
    /// The agent as stored
    pub agent: AgentSummary,
}

/// Data source kinds an agent can be built on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    /// A single BigQuery table
    BigQuery,
    /// A single Looker explore
    Looker,
}

impl DataSourceKind {
    /// Parse the `data_source` field of a create request
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BigQuery" => Some(Self::BigQuery),
            "Looker" => Some(Self::Looker),
            _ => None,
        }
    }
}

/// Create agent request
#[derive(Debug, Default, Deserialize)]
pub struct CreateAgentRequest {
    /// Display name for the new agent
    pub display_name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Instructions given to the agent
    #[serde(default)]
    pub system_instruction: String,
    /// "BigQuery" or "Looker"
    pub data_source: String,
    /// BigQuery project of the table
    #[serde(default)]
    pub bq_project_id: Option<String>,
    /// BigQuery dataset of the table
    #[serde(default)]
    pub bq_dataset_id: Option<String>,
    /// BigQuery table id
    #[serde(default)]
    pub bq_table_id: Option<String>,
    /// Looker instance URL
    #[serde(default)]
    pub looker_instance_url: Option<String>,
    /// LookML model
    #[serde(default)]
    pub looker_model: Option<String>,
    /// Looker explore
    #[serde(default)]
    pub looker_explore: Option<String>,
}

impl CreateAgentRequest {
    /// Validate the data source fields and build the references
    pub fn datasource_references(&self) -> Result<DatasourceReferences, AppError> {
        match DataSourceKind::parse(&self.data_source) {
            Some(DataSourceKind::BigQuery) => {
                let (Some(project_id), Some(dataset_id), Some(table_id)) = (
                    non_blank(&self.bq_project_id),
                    non_blank(&self.bq_dataset_id),
                    non_blank(&self.bq_table_id),
                ) else {
                    return Err(AppError::BadRequest(
                        "BigQuery project_id, dataset_id, and table_id are required".to_string(),
                    ));
                };
                Ok(DatasourceReferences {
                    bq: Some(BigQueryTableReferences {
                        table_references: vec![BigQueryTableReference {
                            project_id: project_id.to_string(),
                            dataset_id: dataset_id.to_string(),
                            table_id: table_id.to_string(),
                        }],
                    }),
                    ..Default::default()
                })
            }
            Some(DataSourceKind::Looker) => {
                let (Some(instance), Some(model), Some(explore)) = (
                    non_blank(&self.looker_instance_url),
                    non_blank(&self.looker_model),
                    non_blank(&self.looker_explore),
                ) else {
                    return Err(AppError::BadRequest(
                        "Looker instance URL, model, and explore are required".to_string(),
                    ));
                };
                Ok(DatasourceReferences {
                    looker: Some(LookerExploreReferences {
                        explore_references: vec![LookerExploreReference {
                            looker_instance_uri: instance.to_string(),
                            lookml_model: model.to_string(),
                            explore: explore.to_string(),
                        }],
                    }),
                    ..Default::default()
                })
            }
            None => Err(AppError::BadRequest(
                "Invalid data source. Must be 'BigQuery' or 'Looker'".to_string(),
            )),
        }
    }
}

/// Update agent request
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAgentRequest {
    /// New display name
    pub display_name: String,
    /// New description
    #[serde(default)]
    pub description: String,
    /// New instructions
    #[serde(default)]
    pub system_instruction: String,
}

/// Agent JSON as listed to the frontend
///
/// The camelCase resource plus snake_case shortcuts into the published
/// context.
pub fn agent_listing(agent: &DataAgent) -> Value {
    let mut listing = serde_json::to_value(agent).unwrap_or_else(|_| json!({}));
    let context = agent.published_context();

    if let Value::Object(map) = &mut listing {
        map.insert(
            "create_time".into(),
            format_timestamp(agent.create_time.as_ref()),
        );
        map.insert(
            "update_time".into(),
            format_timestamp(agent.update_time.as_ref()),
        );
        map.insert(
            "system_instruction".into(),
            json!(context.and_then(|c| c.system_instruction.as_deref())),
        );
        map.insert(
            "datasource_references".into(),
            context
                .and_then(|c| c.datasource_references.as_ref())
                .and_then(|refs| serde_json::to_value(refs).ok())
                .unwrap_or(Value::Null),
        );
    }

    listing
}

fn agent_with_context(
    name: String,
    display_name: &str,
    description: &str,
    system_instruction: &str,
    datasource_references: Option<DatasourceReferences>,
) -> DataAgent {
    DataAgent {
        name,
        display_name: Some(display_name.to_string()),
        description: Some(description.to_string()),
        data_analytics_agent: Some(DataAnalyticsAgent {
            published_context: Some(Context {
                system_instruction: Some(system_instruction.to_string()),
                datasource_references,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn require_display_name(display_name: &str) -> Result<(), AppError> {
    if display_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Agent display name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/agents - List data agents in the project
pub async fn list_agents(
    State(state): State<SharedState>,
    BearerToken(token): BearerToken,
) -> Result<Json<AgentsListResponse>, AppError> {
    let agents = state
        .analytics
        .list_data_agents(&token, &state.config.parent())
        .await
        .map_err(|e| e.context("API error listing agents"))?;

    tracing::debug!(count = agents.len(), "Listed data agents");
    Ok(Json(AgentsListResponse {
        agents: agents.iter().map(agent_listing).collect(),
    }))
}

/// POST /api/agents - Create a data agent
pub async fn create_agent(
    State(state): State<SharedState>,
    BearerToken(token): BearerToken,
    Json(request): Json<CreateAgentRequest>,
) -> Result<Json<AgentMutationResponse>, AppError> {
    require_display_name(&request.display_name)?;
    let references = request.datasource_references()?;

    let parent = state.config.parent();
    let agent_id = format!("a{}", uuid::Uuid::new_v4());
    let agent = agent_with_context(
        format!("{}/dataAgents/{}", parent, agent_id),
        &request.display_name,
        &request.description,
        &request.system_instruction,
        Some(references),
    );

    let created = state
        .analytics
        .create_data_agent(&token, &parent, &agent_id, &agent)
        .await
        .map_err(|e| e.context("API error creating agent"))?;

    tracing::info!(agent = %created.name, data_source = %request.data_source, "Created data agent");
    Ok(Json(AgentMutationResponse {
        message: format!("Agent '{}' successfully created", request.display_name),
        agent: AgentSummary::from(&created),
    }))
}

/// PUT /api/agents/:agent_name - Update an agent by percent-encoded resource name
pub async fn update_agent(
    State(state): State<SharedState>,
    Path(agent_name): Path<String>,
    BearerToken(token): BearerToken,
    Json(request): Json<UpdateAgentRequest>,
) -> Result<Json<AgentMutationResponse>, AppError> {
    apply_update(&state, &token, &agent_name, request).await
}

/// PUT /api/agents/projects/:project/locations/:location/dataAgents/:agent_id
pub async fn update_agent_by_path(
    State(state): State<SharedState>,
    Path((project, location, agent_id)): Path<(String, String, String)>,
    BearerToken(token): BearerToken,
    Json(request): Json<UpdateAgentRequest>,
) -> Result<Json<AgentMutationResponse>, AppError> {
    let name = format!(
        "projects/{}/locations/{}/dataAgents/{}",
        project, location, agent_id
    );
    apply_update(&state, &token, &name, request).await
}

async fn apply_update(
    state: &SharedState,
    token: &str,
    agent_name: &str,
    request: UpdateAgentRequest,
) -> Result<Json<AgentMutationResponse>, AppError> {
    require_display_name(&request.display_name)?;

    let existing = state
        .analytics
        .get_data_agent(token, agent_name)
        .await
        .map_err(|e| e.context("API error updating agent"))?;

    let references = existing
        .published_context()
        .and_then(|c| c.datasource_references.clone());
    let agent = agent_with_context(
        existing.name.clone(),
        &request.display_name,
        &request.description,
        &request.system_instruction,
        references,
    );

    let updated = state
        .analytics
        .update_data_agent(token, &agent, UPDATE_MASK)
        .await
        .map_err(|e| e.context("API error updating agent"))?;

    tracing::info!(agent = %updated.name, "Updated data agent");
    Ok(Json(AgentMutationResponse {
        message: "Agent successfully updated".to_string(),
        agent: AgentSummary::from(&updated),
    }))
}

/// DELETE /api/agents/projects/:project/locations/:location/dataAgents/:agent_id
pub async fn delete_agent(
    State(state): State<SharedState>,
    Path((project, location, agent_id)): Path<(String, String, String)>,
    BearerToken(token): BearerToken,
) -> Result<Json<MessageResponse>, AppError> {
    let name = format!(
        "projects/{}/locations/{}/dataAgents/{}",
        project, location, agent_id
    );

    state
        .analytics
        .delete_data_agent(&token, &name)
        .await
        .map_err(|e| e.context("API error deleting agent"))?;

    tracing::info!(agent = %name, "Deleted data agent");
    Ok(Json(MessageResponse::new("Agent successfully deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::app_state::test_state;
    use mockito::Matcher;

    const AGENTS_PATH: &str = "/v1beta/projects/demo-project/locations/global/dataAgents";

    fn token() -> BearerToken {
        BearerToken("ya29.token".to_string())
    }

    fn bigquery_request() -> CreateAgentRequest {
        CreateAgentRequest {
            display_name: "Sales".to_string(),
            description: "Sales analytics".to_string(),
            system_instruction: "Answer briefly".to_string(),
            data_source: "BigQuery".to_string(),
            bq_project_id: Some("bigquery-public-data".to_string()),
            bq_dataset_id: Some("thelook".to_string()),
            bq_table_id: Some("orders".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_bigquery_references() {
        let refs = bigquery_request().datasource_references().unwrap();
        let table = &refs.bq.unwrap().table_references[0];
        assert_eq!(table.dataset_id, "thelook");
        assert!(refs.looker.is_none());
    }

    #[test]
    fn test_datasource_validation_messages() {
        let mut request = bigquery_request();
        request.bq_table_id = Some("  ".to_string());
        match request.datasource_references() {
            Err(AppError::BadRequest(msg)) => assert_eq!(
                msg,
                "BigQuery project_id, dataset_id, and table_id are required"
            ),
            other => panic!("unexpected: {:?}", other),
        }

        let looker = CreateAgentRequest {
            display_name: "Orders".to_string(),
            data_source: "Looker".to_string(),
            looker_instance_url: Some("https://looker.example.com".to_string()),
            looker_model: Some("ecommerce".to_string()),
            ..Default::default()
        };
        match looker.datasource_references() {
            Err(AppError::BadRequest(msg)) => {
                assert_eq!(msg, "Looker instance URL, model, and explore are required")
            }
            other => panic!("unexpected: {:?}", other),
        }

        let invalid = CreateAgentRequest {
            display_name: "X".to_string(),
            data_source: "Spreadsheet".to_string(),
            ..Default::default()
        };
        match invalid.datasource_references() {
            Err(AppError::BadRequest(msg)) => {
                assert_eq!(msg, "Invalid data source. Must be 'BigQuery' or 'Looker'")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_agent_listing_flattens_context() {
        let agent: DataAgent = serde_json::from_value(json!({
            "name": "projects/p/locations/global/dataAgents/a1",
            "displayName": "Sales",
            "createTime": "2024-05-01T10:00:00Z",
            "dataAnalyticsAgent": {"publishedContext": {
                "systemInstruction": "Be brief",
                "datasourceReferences": {"bq": {"tableReferences": [
                    {"projectId": "p", "datasetId": "d", "tableId": "t"}
                ]}}
            }}
        }))
        .unwrap();

        let listing = agent_listing(&agent);
        assert_eq!(listing["displayName"], "Sales");
        assert_eq!(listing["create_time"], "2024-05-01T10:00:00+00:00");
        assert!(listing["update_time"].is_null());
        assert_eq!(listing["system_instruction"], "Be brief");
        assert_eq!(
            listing["datasource_references"]["bq"]["tableReferences"][0]["tableId"],
            "t"
        );
    }

    #[tokio::test]
    async fn test_list_agents() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", AGENTS_PATH)
            .match_header("authorization", "Bearer ya29.token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"dataAgents":[{"name":"projects/demo-project/locations/global/dataAgents/a1","displayName":"Sales"}]}"#,
            )
            .create_async()
            .await;

        let state = test_state(&server.url());
        let Json(response) = list_agents(State(state), token()).await.unwrap();
        assert_eq!(response.agents.len(), 1);
        assert_eq!(response.agents[0]["displayName"], "Sales");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_agents_upstream_error_has_context() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", AGENTS_PATH)
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"message":"Permission denied"}}"#)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let err = list_agents(State(state), token()).await.unwrap_err();
        assert_eq!(err.to_string(), "API error listing agents: Permission denied");
    }

    #[tokio::test]
    async fn test_create_agent_validates_before_calling_api() {
        // Nothing listens here; validation must fail first
        let state = test_state("http://127.0.0.1:9");
        let request = CreateAgentRequest {
            display_name: "Bad".to_string(),
            data_source: "CSV".to_string(),
            ..Default::default()
        };
        let result = create_agent(State(state), token(), Json(request)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_agent() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", AGENTS_PATH)
            .match_query(Matcher::Regex("dataAgentId=a[0-9a-f-]{36}".to_string()))
            .match_body(Matcher::PartialJson(json!({
                "displayName": "Sales",
                "dataAnalyticsAgent": {"publishedContext": {
                    "systemInstruction": "Answer briefly",
                    "datasourceReferences": {"bq": {"tableReferences": [
                        {"projectId": "bigquery-public-data", "datasetId": "thelook", "tableId": "orders"}
                    ]}}
                }}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name":"projects/demo-project/locations/global/operations/op1","done":true,
                    "response":{"@type":"type.googleapis.com/google.cloud.geminidataanalytics.v1beta.DataAgent",
                    "name":"projects/demo-project/locations/global/dataAgents/a1","displayName":"Sales","description":"Sales analytics"}}"#,
            )
            .create_async()
            .await;

        let state = test_state(&server.url());
        let Json(response) = create_agent(State(state), token(), Json(bigquery_request()))
            .await
            .unwrap();
        assert_eq!(response.message, "Agent 'Sales' successfully created");
        assert_eq!(
            response.agent.name,
            "projects/demo-project/locations/global/dataAgents/a1"
        );
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_agent_keeps_datasource_references() {
        let mut server = mockito::Server::new_async().await;
        let agent_path = format!("{}/a1", AGENTS_PATH);
        server
            .mock("GET", agent_path.as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name":"projects/demo-project/locations/global/dataAgents/a1","displayName":"Old",
                    "dataAnalyticsAgent":{"publishedContext":{"systemInstruction":"old",
                    "datasourceReferences":{"bq":{"tableReferences":[{"projectId":"p","datasetId":"d","tableId":"t"}]}}}}}"#,
            )
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", agent_path.as_str())
            .match_query(Matcher::UrlEncoded("updateMask".into(), UPDATE_MASK.into()))
            .match_body(Matcher::PartialJson(json!({
                "displayName": "New",
                "dataAnalyticsAgent": {"publishedContext": {
                    "systemInstruction": "new",
                    "datasourceReferences": {"bq": {"tableReferences": [
                        {"projectId": "p", "datasetId": "d", "tableId": "t"}
                    ]}}
                }}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"operations/op2","done":true}"#)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let request = UpdateAgentRequest {
            display_name: "New".to_string(),
            description: "Updated".to_string(),
            system_instruction: "new".to_string(),
        };
        let Json(response) = update_agent(
            State(state),
            Path("projects/demo-project/locations/global/dataAgents/a1".to_string()),
            token(),
            Json(request),
        )
        .await
        .unwrap();
        assert_eq!(response.message, "Agent successfully updated");
        assert_eq!(response.agent.display_name.as_deref(), Some("New"));
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_agent() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", format!("{}/a1", AGENTS_PATH).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"operations/op3","done":true}"#)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let Json(response) = delete_agent(
            State(state),
            Path((
                "demo-project".to_string(),
                "global".to_string(),
                "a1".to_string(),
            )),
            token(),
        )
        .await
        .unwrap();
        assert_eq!(response.message, "Agent successfully deleted");
        delete.assert_async().await;
    }
}
