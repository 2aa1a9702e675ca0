//! Storage layer module.
//!
//! This module provides trait-based storage abstraction allowing different backends
//! to be used without changing business logic.

pub mod collection;
pub mod factory;
pub mod file;
pub mod postgres;
pub mod redis;
pub mod traits;

pub use collection::Collection;
pub use factory::create_storage;
pub use traits::{CounterStorage, DocumentStorage, Storage};
