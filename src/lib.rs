//! Conversational Analytics API
//!
//! Backend for chatting with Gemini Data Analytics agents: Google OAuth
//! sign-in, data agent management and streamed conversations.
//! The binary is in `src/main.rs`.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod server;
/// Application state shared by handlers
pub mod state;
