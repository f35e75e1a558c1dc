use crate::domain::recipe::AttributeKind;
use crate::presentation::handlers::{health_check, json_error_handler, query_error_handler};
use crate::presentation::{recipe, user};
use actix_web::{Scope, web};

/// The `/api` tree. Uploads may be up to `max_upload_bytes` large.
pub fn configure(max_upload_bytes: usize) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(health_check))
                    .service(user_scope())
                    .service(
                        web::scope("/recipe")
                            .service(attribute_scope("/tags", AttributeKind::Tag))
                            .service(attribute_scope("/ingredients", AttributeKind::Ingredient))
                            .service(recipe_scope(max_upload_bytes)),
                    ),
            );
    }
}

fn user_scope() -> Scope {
    web::scope("/user")
        .service(web::resource("/create/").route(web::post().to(user::create_user)))
        .service(web::resource("/token/").route(web::post().to(user::create_token)))
        .service(
            web::resource("/me/")
                .route(web::get().to(user::get_me))
                .route(web::put().to(user::replace_me))
                .route(web::patch().to(user::patch_me))
                .route(web::delete().to(user::delete_me)),
        )
}

fn attribute_scope(path: &str, kind: AttributeKind) -> Scope {
    web::scope(path)
        .app_data(web::Data::new(kind))
        .service(
            web::resource("/")
                .route(web::get().to(recipe::list_attributes))
                .route(web::post().to(recipe::create_attribute)),
        )
        .service(
            web::resource("/{id}/")
                .route(web::get().to(recipe::get_attribute))
                .route(web::put().to(recipe::replace_attribute))
                .route(web::patch().to(recipe::patch_attribute))
                .route(web::delete().to(recipe::delete_attribute)),
        )
}

fn recipe_scope(max_upload_bytes: usize) -> Scope {
    web::scope("/recipes")
        .service(
            web::resource("/")
                .route(web::get().to(recipe::list_recipes))
                .route(web::post().to(recipe::create_recipe)),
        )
        .service(
            web::resource("/{id}/")
                .route(web::get().to(recipe::get_recipe))
                .route(web::put().to(recipe::replace_recipe))
                .route(web::patch().to(recipe::patch_recipe))
                .route(web::delete().to(recipe::delete_recipe)),
        )
        .service(
            web::resource("/{id}/upload-image/")
                .app_data(web::PayloadConfig::new(max_upload_bytes))
                .route(web::post().to(recipe::upload_image)),
        )
}
