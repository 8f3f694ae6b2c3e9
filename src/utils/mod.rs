pub mod config;
pub mod jwt_decode;
#[cfg(test)]
pub mod jwt_encode;
pub mod rate_limiter;
pub mod state;
