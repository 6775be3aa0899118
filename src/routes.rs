use crate::handlers;
use actix_web::web;

/// Configures the entire HTTP surface: the one submission route, mounted
/// without auth middleware (authentication is out of scope of the core; the
/// host process wires in whatever it needs in front of this).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health_check)));
    cfg.service(web::resource("/submissions").route(web::post().to(handlers::create_submission)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn routes_compile() {
        let _app = test::init_service(actix_web::App::new().configure(configure_routes)).await;
    }
}
