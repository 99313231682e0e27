pub mod auth;
pub mod catalog;
pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
mod error;
pub mod generate;
pub mod kmeans;
pub mod matcher;
pub mod naming;
pub mod pipeline;
pub mod storage;
#[cfg(test)]
mod testing;
pub mod tryon;
pub mod utils;

pub use config::Opts;
pub use error::{Error, Result};
