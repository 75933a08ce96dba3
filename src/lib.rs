pub mod config;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod report;
pub mod storage;
