pub mod analysis;
pub mod config;
pub mod fetch;
pub mod llm;
pub mod plot;
pub mod process;
pub mod server;
pub mod stats;
