pub mod channels;
pub mod process;
pub mod version;
