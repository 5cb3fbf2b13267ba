pub mod error;
pub mod logging;
pub mod time;

pub use error::{ErrorKind, ProxyError, ProxyResult};
