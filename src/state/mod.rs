// State management module
// Holds configuration and outbound clients shared across requests

pub mod app_state;

pub use app_state::{AppState, SharedState};
