pub mod handlers;
pub mod middleware;
pub mod recipe;
pub mod routes;
pub mod user;
