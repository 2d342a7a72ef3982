//! When vehicles run: frequency expansion and the time index.

pub mod frequency;
pub mod time_index;

pub use frequency::{frequency_windows, FrequencyWindow};
pub use time_index::{build_time_index, ActiveVehicleInstance, TimeIndexedVehicles};
