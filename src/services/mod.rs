pub mod ai_gateway;
pub mod gamification;
pub mod generator;
pub mod movement;
pub mod reference;
pub mod rules;
pub mod wearables;
