/// Billable clients and their projects
mod manager;

pub use manager::{ClientManager, ProjectData, ProjectTaskData};
