//! Collectors for host stats read from `/proc` and `statvfs(3)`.

pub mod parser;
pub mod system;

pub use parser::{MountEntry, ParseError};
pub use system::{CollectError, SystemCollector};
