//! Domain types and pure logic shared by the repository and API layers.
//!
//! Nothing in this crate touches the database or the network, so every rule
//! here can be unit-tested in isolation.

pub mod audit;
pub mod error;
pub mod hashing;
pub mod menus;
pub mod pages;
pub mod permissions;
pub mod roles;
pub mod security;
pub mod types;
pub mod validation;
