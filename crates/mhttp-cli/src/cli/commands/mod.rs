//! CLI command handlers, one per file.

mod bench;
mod checksum;
mod get;
mod probe;

pub use bench::run_bench;
pub use checksum::run_checksum;
pub use get::{run_get, GetArgs};
pub use probe::run_probe;
