//! Genesis writer: drains the accumulated ledger state and stake graph into
//! the new chain's genesis image, rows encoded against the target ABI and
//! the whole file covered by a running SHA-256.

pub mod abi;
pub mod builder;
pub mod section;

pub use abi::{AbiDef, AbiError, AbiType, AbiValue};
pub use builder::{
    genesis_abi, mint_names, primary_distributor, secondary_distributor, vesting_distributor,
    write_genesis, ExchangePrice, GenesisParams,
};
pub use section::{SectionWriter, OUTPUT_MAGIC, OUTPUT_VERSION};
