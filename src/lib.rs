pub mod api;
pub mod config;
pub mod factor;
pub mod observability;
pub mod queue;
pub mod service;
pub mod status;
pub mod worker;
