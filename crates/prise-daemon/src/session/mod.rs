pub mod client;
pub mod input;
pub mod manager;
pub mod outbox;

pub use manager::{PtySummary, SessionManager};
