//! Backend for real-time races: session registry, lifecycle rules and the
//! HTTP surface in front of them.

pub mod handlers;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod utils;
