/// Time entries and the reporting week math
mod manager;
pub mod week;

pub use manager::{TimeEntryInput, TimeManager};
