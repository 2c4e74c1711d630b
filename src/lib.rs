pub mod api;
pub mod assets;
pub mod cli;
pub mod client;
pub mod config;
pub mod entities;
pub mod error;
pub mod storage;
pub mod utils;
pub mod web_ui;
