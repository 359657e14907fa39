mod message;

pub mod classifier;
pub mod constants;
pub mod process;
pub mod target;
pub mod workdir;

// re-export for convenient use with `message`
pub use colored::Colorize;
