pub mod db;
mod credits;
mod files;
pub mod models;
mod payments;
mod profiles;
mod tables;

pub use db::{Database, DatabaseError};
pub use tables::*;
