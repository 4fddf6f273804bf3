pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod remote;
pub mod search;
pub mod state;
pub mod utils;
