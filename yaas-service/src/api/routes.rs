//! # Route Configuration
//!
//! Maps the spec §6.1 HTTP surface to handlers.
//!
//! ```text
//! /
//! ├── health                                     GET
//! ├── refresh_token                              POST
//! ├── self-service/
//! │   ├── login/flows                            GET
//! │   ├── login                                  POST  ?flow=<id>
//! │   ├── registration/flows                     GET
//! │   ├── registration                           POST  ?flow=<id>
//! │   ├── logout/flows                            GET
//! │   ├── logout                                 POST  ?flow=<id>
//! │   └── oauth/callback                         GET   ?provider=&state=&code=
//! └── actions/                                    admin surface
//!     ├── (root)                                  GET, POST
//!     └── {id}                                    PUT, DELETE
//! ```

use actix_web::web;

use super::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health_check))
        .route("/refresh_token", web::post().to(handlers::refresh_token))
        .service(
            web::scope("/self-service")
                .route("/login/flows", web::get().to(handlers::login_flows))
                .route("/login", web::post().to(handlers::login_proceed))
                .route("/registration/flows", web::get().to(handlers::registration_flows))
                .route("/registration", web::post().to(handlers::registration_proceed))
                .route("/logout/flows", web::get().to(handlers::logout_flows))
                .route("/logout", web::post().to(handlers::logout_proceed))
                .route("/oauth/callback", web::get().to(handlers::oauth_callback)),
        )
        .service(
            web::scope("/actions")
                .route("", web::get().to(handlers::list_actions))
                .route("", web::post().to(handlers::create_action))
                .route("/{id}", web::put().to(handlers::update_action))
                .route("/{id}", web::delete().to(handlers::delete_action)),
        );
}

#[cfg(test)]
mod tests {
    #[test]
    fn configure_compiles() {
        assert!(true);
    }
}
