use actix_web::{web, Responder};
use log::info;

use crate::api::response::respond;
use crate::models::permission::GrantRequest;
use crate::permission::PermissionRegistry;

/// Flat permission list
pub async fn list_permissions(registry: web::Data<PermissionRegistry>) -> impl Responder {
    respond(Ok(registry.permissions().to_vec()))
}

/// Permission catalogue as an unchecked tree
pub async fn permission_tree(registry: web::Data<PermissionRegistry>) -> impl Responder {
    respond(registry.tree().map(|t| t.to_nodes()))
}

/// List roles
pub async fn list_roles(registry: web::Data<PermissionRegistry>) -> impl Responder {
    respond(Ok(registry.list_roles()))
}

/// Permission tree with the role's grant checked in
pub async fn role_permissions(
    registry: web::Data<PermissionRegistry>,
    path: web::Path<u64>,
) -> impl Responder {
    respond(registry.role_tree(path.into_inner()))
}

/// Replace a role's grant. Folder permissions in the request are dropped;
/// only leaves are stored.
pub async fn grant_role_permissions(
    registry: web::Data<PermissionRegistry>,
    path: web::Path<u64>,
    req: web::Json<GrantRequest>,
) -> impl Responder {
    let role_id = path.into_inner();
    info!("Granting {} permissions to role {}", req.permission_ids.len(), role_id);
    respond(registry.grant(role_id, &req.permission_ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes;
    use crate::models::envelope::ApiEnvelope;
    use crate::models::permission::{Permission, PermissionNode, Role};
    use actix_web::{test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_grant_keeps_leaves_only() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(PermissionRegistry::with_defaults().unwrap()))
                .configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/role/2/permissions")
            .set_json(json!({ "permissionIds": [1, 11, 111, 112] }))
            .to_request();
        let role: ApiEnvelope<Role> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(role.data.unwrap().permission_ids, vec![111, 112]);

        let req = test::TestRequest::get().uri("/api/role/2/permissions").to_request();
        let tree: ApiEnvelope<Vec<PermissionNode>> = test::call_and_read_body_json(&app, req).await;
        let tree = tree.data.unwrap();
        let logs = tree.iter().find(|n| n.code == "log").unwrap();
        assert!(logs.indeterminate);
        assert!(!logs.children[0].checked);
        assert!(logs.children[0].indeterminate);
    }

    #[actix_web::test]
    async fn test_list_endpoints() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(PermissionRegistry::with_defaults().unwrap()))
                .configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/permission/list").to_request();
        let flat: ApiEnvelope<Vec<Permission>> = test::call_and_read_body_json(&app, req).await;
        assert!(flat.data.unwrap().iter().any(|p| p.code == "system:role:grant"));

        let req = test::TestRequest::get().uri("/api/permission/tree").to_request();
        let tree: ApiEnvelope<Vec<PermissionNode>> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(tree.data.unwrap().len(), 3);

        let req = test::TestRequest::get().uri("/api/role/list").to_request();
        let roles: ApiEnvelope<Vec<Role>> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(roles.data.unwrap().len(), 2);

        let req = test::TestRequest::get().uri("/api/role/9/permissions").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 404);
    }
}
