use actix_web::{web, Responder};
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::response::respond;
use crate::inventory::InventoryManager;
use crate::models::inventory::{ComponentAction, ComponentStatus};

/// Query parameters for listing components
#[derive(Deserialize)]
pub struct ComponentsQuery {
    environment: Option<String>,
    status: Option<ComponentStatus>,
}

/// List inventory components
pub async fn list_components(
    inventory: web::Data<Arc<RwLock<InventoryManager>>>,
    query: web::Query<ComponentsQuery>,
) -> impl Responder {
    let inventory = inventory.read().await;
    respond(Ok(inventory.list(query.environment.as_deref(), query.status)))
}

/// Get one component
pub async fn get_component(
    inventory: web::Data<Arc<RwLock<InventoryManager>>>,
    path: web::Path<u64>,
) -> impl Responder {
    let inventory = inventory.read().await;
    respond(inventory.get(path.into_inner()))
}

/// Start, stop or restart a component
pub async fn component_action(
    inventory: web::Data<Arc<RwLock<InventoryManager>>>,
    path: web::Path<(u64, ComponentAction)>,
) -> impl Responder {
    let (id, action) = path.into_inner();
    let mut inventory = inventory.write().await;
    info!("Component {} {:?} requested", id, action);
    respond(inventory.perform(id, action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes;
    use crate::models::envelope::ApiEnvelope;
    use crate::models::inventory::ComponentRecord;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_component_lifecycle_over_http() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(RwLock::new(InventoryManager::with_defaults()))))
                .configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/components?environment=production&status=running")
            .to_request();
        let listed: ApiEnvelope<Vec<ComponentRecord>> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed.data.unwrap().len(), 3);

        let req = test::TestRequest::post().uri("/api/components/5/start").to_request();
        let started: ApiEnvelope<ComponentRecord> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(started.data.unwrap().status, ComponentStatus::Running);

        let req = test::TestRequest::post().uri("/api/components/5/start").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);

        let req = test::TestRequest::get().uri("/api/components/5").to_request();
        let fetched: ApiEnvelope<ComponentRecord> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched.data.unwrap().status, ComponentStatus::Running);
    }

    #[actix_web::test]
    async fn test_bad_path_and_query_answer_with_envelope() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(RwLock::new(InventoryManager::with_defaults()))))
                .configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/components/5/explode").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 404);
        let body: ApiEnvelope<()> = test::read_body_json(resp).await;
        assert_eq!(body.code, 404);
        assert!(body.data.is_none());

        let req = test::TestRequest::get().uri("/api/components?status=bogus").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
        let body: ApiEnvelope<()> = test::read_body_json(resp).await;
        assert_eq!(body.code, 400);
        assert!(!body.message.is_empty());
    }
}
