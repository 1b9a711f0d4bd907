mod dir;
mod file;

pub use dir::{DIR_OVERHEAD, DirContent};
pub use file::{ENTRY_OVERHEAD, FileSystemEntry};
