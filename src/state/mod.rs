//! State module for tracking validation progress
//!
//! # Components
//!
//! - `PageStatus`: lifecycle of a single page record (pending, fetched, failed)
//! - `HostState`: per-host in-flight count and politeness timing

mod host_state;
mod page_status;

pub use host_state::HostState;
pub use page_status::PageStatus;
