pub mod registry;
pub mod snapshot;
pub mod source;

pub use registry::ProcessRegistry;
pub use snapshot::ProcessSnapshot;
pub use source::{ProcessSource, SysinfoProcessSource};
