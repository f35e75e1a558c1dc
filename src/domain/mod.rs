pub mod error;
pub mod recipe;
pub mod repository;
pub mod user;
