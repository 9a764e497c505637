pub mod auth;
pub mod factory;
pub mod mexc;
pub mod paper;
pub mod traits;
pub mod types;

#[cfg(test)]
mod types_tests;
