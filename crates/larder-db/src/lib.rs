//! Persistence layer for larder: connection pooling, embedded migrations,
//! row models and query functions for every table.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
