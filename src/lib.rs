pub mod angles;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod pipeline;
pub mod pose;
pub mod postprocess;
pub mod series;
pub mod source;
pub mod tracker;
