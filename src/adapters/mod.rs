//! Adapters implementing the domain ports.

pub mod executors;
pub mod oracles;
pub mod pages;
pub mod store;
