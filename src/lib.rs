pub mod command_runner;
pub mod config;
pub mod services;
