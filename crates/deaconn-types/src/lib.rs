pub mod api;
pub mod categories;
pub mod models;
pub mod policy;
pub mod roles;

pub use roles::Role;
