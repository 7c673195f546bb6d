mod access_token_fake;
mod friendship_service_impl;

pub use access_token_fake::*;
pub use friendship_service_impl::*;
