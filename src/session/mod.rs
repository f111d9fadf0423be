/// Session lifecycle: login, logout, token validation and recovery flows
mod manager;

pub use manager::SessionManager;
