use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use recipe_api::domain::error::DomainError;
use recipe_api::infrastructure::config::Config;
use recipe_api::infrastructure::logging::init_logging;
use recipe_api::presentation::handlers::AppState;
use recipe_api::presentation::middleware::{
    JwtAuthMiddleware, RequestIdMiddleware, TimingMiddleware,
};
use recipe_api::presentation::routes;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        std::io::Error::other(e)
    })?;
    info!(
        media_root = %config.media_root.display(),
        token_ttl_secs = config.token_ttl_secs,
        "Configuration loaded"
    );

    let state = web::Data::new(AppState::in_memory(&config));

    if let Some(admin) = &config.admin {
        match state
            .users
            .create_superuser(&admin.email, &admin.password)
            .await
        {
            Ok(user) => info!(user_id = user.id, email = %user.email, "Superuser created"),
            Err(e) => match e.downcast_ref::<DomainError>() {
                Some(DomainError::Fields(_)) => info!("Superuser already exists"),
                _ => warn!(error = %e, "Failed to create superuser"),
            },
        }
    }

    let jwt_secret = config.jwt_secret.clone();
    let cors_origin = config.cors_origin.clone();
    let max_upload_bytes = config.max_upload_bytes;

    let server = HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
            None => Cors::default(),
        };

        App::new()
            .app_data(state.clone())
            .wrap(JwtAuthMiddleware::new(jwt_secret.clone()))
            .wrap(cors)
            .wrap(TimingMiddleware)
            .wrap(RequestIdMiddleware)
            .configure(routes::configure(max_upload_bytes))
    });

    let server = server.bind(config.bind_addr.as_str())?;
    info!(address = %config.bind_addr, "Starting HTTP server");
    server.run().await
}
