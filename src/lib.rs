pub mod acquire;
pub mod analyzers;
pub mod clean;
pub mod config;
pub mod error;
pub mod fetch;
pub mod integrate;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod stats;
pub mod table;
pub mod transform;
