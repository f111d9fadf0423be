/// Tenant accounts and their memberships
mod manager;

pub use manager::{AccountManager, CreateAccountData, NewUserData, UpdateAccountData, UpdateProfileData};
