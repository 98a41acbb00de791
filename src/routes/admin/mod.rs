mod error;
pub mod mappings;
pub mod resources;
pub mod roles;
pub mod users;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::AppState;

pub fn get_admin_routes() -> Router<AppState> {
    Router::new().nest("/v1", admin_v1_routes())
}

fn admin_v1_routes() -> Router<AppState> {
    Router::new()
        // Users
        .route("/users", post(users::create).get(users::list))
        .route(
            "/users/{id}",
            get(users::get).patch(users::update).delete(users::delete),
        )
        .route("/users/{id}/roles", get(users::roles))
        .route(
            "/users/{id}/roles/{role}",
            put(users::add_role).delete(users::remove_role),
        )
        .route("/users/{id}/sync", post(users::sync))
        // Roles
        .route("/roles", post(roles::create).get(roles::list))
        .route("/roles/by-name/{name}", get(roles::get_by_name))
        .route(
            "/roles/{id}",
            get(roles::get).patch(roles::update).delete(roles::delete),
        )
        // Resources
        .route("/resources", post(resources::create).get(resources::list))
        .route(
            "/resources/{id}",
            get(resources::get)
                .patch(resources::update)
                .delete(resources::delete),
        )
        // Mapping registry
        .route("/mappings", get(mappings::list))
        .route("/mappings/reload", post(mappings::reload))
}
