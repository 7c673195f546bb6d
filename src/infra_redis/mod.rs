mod access_token_verifier_redis;

pub use access_token_verifier_redis::*;
