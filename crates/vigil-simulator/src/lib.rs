//! Synthetic surveillance data for demo mode.
//!
//! Supplies the demo snapshot, a deterministic generator of push messages,
//! the timer-driven simulated feed, and a gateway wrapper that falls back to
//! demo data when the real backend cannot be reached.

pub mod fallback;
pub mod feed;
pub mod scenario;

pub use fallback::FallbackGateway;
pub use feed::{start_simulated_feed, SimulatedFeedConfig, SimulatedFeedHandle};
pub use scenario::{demo_snapshot, SimulatedMessageGenerator};
