mod relationship_store_mysql;

pub use relationship_store_mysql::*;
