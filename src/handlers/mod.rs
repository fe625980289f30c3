pub mod achievements;
pub mod analysis;
pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod health;
pub mod nutrition;
pub mod plans;
pub mod questionnaires;
pub mod sessions;
pub mod users;
pub mod wearables;
