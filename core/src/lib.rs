pub mod api;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod keypool;
pub mod llm;
pub mod prompts;
pub mod recommend;
pub mod settings;
