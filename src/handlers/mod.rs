pub mod auth;
pub mod dashboard;
pub mod events;
pub mod inventory;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
