pub mod commands;
pub mod config;
pub mod host;
pub mod logging;
pub mod scripting;
