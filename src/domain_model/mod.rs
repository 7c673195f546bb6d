mod relation;
mod user;

pub use relation::*;
pub use user::*;
