pub mod achievement;
pub mod analysis;
pub mod plan;
pub mod questionnaire;
pub mod session;
pub mod user;
pub mod wearable;
