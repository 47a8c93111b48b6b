pub mod access;
pub mod analytics;
pub mod assistant;
pub mod llm_provider;
