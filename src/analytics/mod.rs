//! Gemini Data Analytics API
//!
//! REST client, wire types and the streamed-response decoder used to talk
//! to `geminidataanalytics.googleapis.com`.

pub mod client;
pub mod stream;
pub mod types;

pub use client::DataAnalyticsClient;
