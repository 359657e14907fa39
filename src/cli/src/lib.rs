pub mod capture_command;
pub mod commands;
pub mod config;
pub mod inspect_commands;
pub mod logging;
pub mod process_command;
pub mod target_setup;
