use actix_web::{web, HttpResponse, Responder};
use log::info;
use serde::Deserialize;

use crate::api::response::{respond, respond_created};
use crate::models::filter::PersistedFilter;
use crate::store::FilterRepository;

/// Query parameters for listing filters
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFiltersQuery {
    /// Only filters owned by this user
    user_id: Option<u64>,
}

/// List saved filters
pub async fn list_filters(
    repository: web::Data<FilterRepository>,
    query: web::Query<ListFiltersQuery>,
) -> impl Responder {
    let filters = repository.list(query.user_id);
    info!("Listing {} saved filters (user: {:?})", filters.len(), query.user_id);
    respond(Ok(filters))
}

/// Get one saved filter
pub async fn get_filter(
    repository: web::Data<FilterRepository>,
    path: web::Path<u64>,
) -> impl Responder {
    respond(repository.get(path.into_inner()))
}

/// Create a new filter
pub async fn create_filter(
    repository: web::Data<FilterRepository>,
    req: web::Json<PersistedFilter>,
) -> impl Responder {
    respond_created(repository.create(req.into_inner()), "Filter created successfully")
}

/// Update a filter
pub async fn update_filter(
    repository: web::Data<FilterRepository>,
    path: web::Path<u64>,
    req: web::Json<PersistedFilter>,
) -> impl Responder {
    respond(repository.update(path.into_inner(), req.into_inner()))
}

/// Delete a filter
pub async fn delete_filter(
    repository: web::Data<FilterRepository>,
    path: web::Path<u64>,
) -> HttpResponse {
    let filter_id = path.into_inner();
    respond(repository.delete(filter_id).map(|_| filter_id))
}

/// Create many filters at once; per-row failures are reported in the body
pub async fn import_filters(
    repository: web::Data<FilterRepository>,
    req: web::Json<Vec<PersistedFilter>>,
) -> impl Responder {
    respond(Ok(repository.import(req.into_inner())))
}
