pub mod attribute_service;
pub mod recipe_service;
pub mod user_service;
