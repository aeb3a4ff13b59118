pub mod app;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod http;
pub mod mentions;
pub mod output;
pub mod providers;
pub mod server;
pub mod sheet;
pub mod workspace;
