//! API module
//!
//! HTTP request handlers for authentication, data agents and chat, and the
//! routes that mount them.

pub mod agents;
pub mod auth;
pub mod chat;
pub mod utils;

use crate::state::SharedState;
use axum::{
    routing::{get, post, put},
    Router,
};

/// Routes under the API prefix (`""` mounts them at the root)
pub fn routes(prefix: &str) -> Router<SharedState> {
    let path = |suffix: &str| format!("{}{}", prefix, suffix);

    Router::new()
        // Authentication
        .route(&path("/auth/google/url"), get(auth::google_url))
        .route(&path("/auth/callback"), get(auth::callback))
        .route(&path("/auth/google/callback"), post(auth::exchange_code))
        .route(&path("/auth/logout"), get(auth::logout))
        .route(&path("/auth/me"), get(auth::me))
        // Data agents
        .route(
            &path("/agents"),
            get(agents::list_agents).post(agents::create_agent),
        )
        .route(
            &path("/agents/"),
            get(agents::list_agents).post(agents::create_agent),
        )
        .route(&path("/agents/:agent_name"), put(agents::update_agent))
        .route(
            &path("/agents/projects/:project/locations/:location/dataAgents/:agent_id"),
            put(agents::update_agent_by_path).delete(agents::delete_agent),
        )
        // Chat
        .route(
            &path("/chat/conversations"),
            post(chat::create_conversation),
        )
        .route(
            &path("/chat/conversations/*path"),
            get(chat::get_conversation_resource).post(chat::post_conversation_resource),
        )
}
