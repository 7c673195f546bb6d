mod access_token;
mod friendship_service;

pub use access_token::*;
pub use friendship_service::*;
