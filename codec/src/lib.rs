mod cursor;
mod format;
mod records;

pub use cursor::*;
pub use format::*;
pub use records::*;
