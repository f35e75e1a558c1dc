pub mod attribute_repository;
pub mod recipe_repository;
pub mod user_repository;
