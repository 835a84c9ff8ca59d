//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `DomainState`: per-domain delay, backoff and suspension bookkeeping
//! - `SessionState`: lifecycle of one crawl session

mod domain_state;
mod session_state;

pub use domain_state::DomainState;
pub use session_state::SessionState;
