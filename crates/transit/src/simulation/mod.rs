//! Running the simulation: position engines, the clock and the session that
//! ties them to a loaded feed.

pub mod clock;
pub mod legacy;
pub mod positions;
pub mod session;
pub mod worker;

pub use clock::SimulationClock;
pub use legacy::LegacyPositionEngine;
pub use positions::vehicle_positions_optimized;
pub use session::{FeedSession, PrecomputedFeed};
pub use worker::{spawn_precompute, PrecomputeHandle};
