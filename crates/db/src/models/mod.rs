//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - `Deserialize` create/update DTOs where the table is written from requests

pub mod audit;
pub mod menu;
pub mod page;
pub mod role;
pub mod security;
pub mod user;
