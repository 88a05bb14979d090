use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::api::handlers::{
    components::{component_action, get_component, list_components},
    filters::{create_filter, delete_filter, get_filter, import_filters, list_filters, update_filter},
    permissions::{
        grant_role_permissions, list_permissions, list_roles, permission_tree, role_permissions,
    },
};
use crate::models::envelope::ApiEnvelope;

/// Root endpoint to provide information about the API
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "Ops Console API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Saved log filters, role permissions and component inventory",
        "endpoints": [
            { "path": "/api/logs/filters", "method": "GET", "description": "List saved filters (optional userId)" },
            { "path": "/api/logs/filters", "method": "POST", "description": "Save a filter" },
            { "path": "/api/logs/filters/import", "method": "POST", "description": "Import a list of filters" },
            { "path": "/api/logs/filters/{id}", "method": "GET", "description": "Get a saved filter" },
            { "path": "/api/logs/filters/{id}", "method": "PUT", "description": "Update a saved filter" },
            { "path": "/api/logs/filters/{id}", "method": "DELETE", "description": "Delete a saved filter" },
            { "path": "/api/permission/list", "method": "GET", "description": "Flat permission list" },
            { "path": "/api/permission/tree", "method": "GET", "description": "Permission tree" },
            { "path": "/api/role/list", "method": "GET", "description": "List roles" },
            { "path": "/api/role/{id}/permissions", "method": "GET", "description": "Role permission tree with check state" },
            { "path": "/api/role/{id}/permissions", "method": "PUT", "description": "Replace a role's leaf permissions" },
            { "path": "/api/components", "method": "GET", "description": "List components (optional environment, status)" },
            { "path": "/api/components/{id}", "method": "GET", "description": "Get a component" },
            { "path": "/api/components/{id}/{action}", "method": "POST", "description": "Start, stop or restart a component" }
        ]
    }))
}

fn envelope_error<E>(err: E, status: StatusCode) -> actix_web::Error
where
    E: std::fmt::Display + std::fmt::Debug + 'static,
{
    let response = HttpResponse::build(status)
        .json(ApiEnvelope::<()>::error(status.as_u16(), err.to_string()));
    InternalError::from_response(err, response).into()
}

/// Malformed JSON bodies answer with the same envelope as handler errors
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| envelope_error(err, StatusCode::BAD_REQUEST))
}

/// Unparseable path segments (an unknown component action, a non-numeric id)
fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| envelope_error(err, StatusCode::NOT_FOUND))
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| envelope_error(err, StatusCode::BAD_REQUEST))
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint
        .route("/", web::get().to(index))
        .service(
            web::scope("/api")
                .app_data(json_config())
                .app_data(path_config())
                .app_data(query_config())
                // Saved log filters
                .service(
                    web::scope("/logs/filters")
                        .route("", web::get().to(list_filters))
                        .route("", web::post().to(create_filter))
                        .route("/import", web::post().to(import_filters))
                        .route("/{id}", web::get().to(get_filter))
                        .route("/{id}", web::put().to(update_filter))
                        .route("/{id}", web::delete().to(delete_filter))
                )
                // Permissions and roles
                .service(
                    web::scope("/permission")
                        .route("/list", web::get().to(list_permissions))
                        .route("/tree", web::get().to(permission_tree))
                )
                .service(
                    web::scope("/role")
                        .route("/list", web::get().to(list_roles))
                        .route("/{id}/permissions", web::get().to(role_permissions))
                        .route("/{id}/permissions", web::put().to(grant_role_permissions))
                )
                // Component inventory
                .service(
                    web::scope("/components")
                        .route("", web::get().to(list_components))
                        .route("/{id}", web::get().to(get_component))
                        .route("/{id}/{action}", web::post().to(component_action))
                )
        );
}
