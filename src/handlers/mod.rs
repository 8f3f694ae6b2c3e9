pub mod admin;
pub mod middleware;
pub mod race;
