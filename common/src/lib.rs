// Exodus common library - main library exports

pub mod distributor;
pub mod errors;
pub mod ids;
pub mod names;
pub mod types;

// Flattened re-exports
pub use self::distributor::SupplyDistributor;
pub use self::errors::{FormatError, InvariantError};
pub use self::ids::IdAllocator;
pub use self::names::NewName;
pub use self::types::*;
