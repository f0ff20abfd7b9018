pub mod cleaning;
pub mod config;
pub mod constants;
pub mod docstore;
pub mod error;
pub mod fetcher;
pub mod frame;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod relational;
pub mod report;
pub mod types;
