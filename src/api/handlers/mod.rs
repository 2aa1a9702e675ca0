//! HTTP request handlers.

pub mod admission;
pub mod competition;
pub mod health;
pub mod results;
pub mod upload;
