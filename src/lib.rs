pub mod app;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod kpi;
pub mod logging;
pub mod models;
pub mod output;
pub mod pagination;
pub mod session;
pub mod table;
pub mod utils;

#[cfg(test)]
mod tests;
