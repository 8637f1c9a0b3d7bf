pub mod config;
pub mod logging;

pub mod bandwidth;
pub mod body;
pub mod checksum;
pub mod client;
pub mod codec;
pub mod control;
pub mod error;
pub mod pool;
pub mod retry;
pub mod session;
pub mod transport;

pub use client::{HttpClient, OpenMode, OpenOptions};
pub use error::{HttpError, Result};
pub use session::{Session, Whence};
