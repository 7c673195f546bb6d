// store

mod relationship_store;
mod versioned_store;

pub use relationship_store::*;
pub use versioned_store::*;
