pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod source;
pub mod workspace;
