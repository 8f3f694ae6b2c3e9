pub mod error;
pub mod event;
pub mod jwt;
pub mod race_session;
pub mod request;
pub mod snapshot;
