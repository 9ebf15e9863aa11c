//! Router tests: full HTTP stack over the in-memory store

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use assetdesk_server::{api, config::AppConfig, repository::Repository, AppState};

struct TestApp {
    router: Router,
    token: String,
}

impl TestApp {
    async fn new() -> Self {
        let state = AppState::new(AppConfig::default(), Repository::memory());
        state.services.auth.ensure_admin().await.unwrap();

        let mut app = Self {
            router: api::create_router(state),
            token: String::new(),
        };
        app.token = app.sign_in("admin", "admin").await["access_token"]
            .as_str()
            .unwrap()
            .to_string();
        app
    }

    async fn sign_in(&self, username: &str, password: &str) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/signin",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "sign-in failed: {body}");
        body
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(&self.token), None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(&self.token), Some(body)).await
    }

    async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(&self.token), Some(body)).await
    }

    async fn patch(&self, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, Some(&self.token), body).await
    }

    async fn create_user(&self, name: &str) -> i64 {
        let (status, body) = self.post("/api/v1/users", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    async fn create_monitor(&self, tag: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/v1/equipment/monitors",
                json!({
                    "asset_tag": tag,
                    "serial_number": format!("SN-{}", tag),
                    "screen_size": "27\""
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.call(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_wrong_password_returns_error_body_with_path() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/auth/signin",
            None,
            Some(json!({ "username": "admin", "password": "nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
    assert_eq!(body["error"], "UNAUTHORIZED");
    assert_eq!(body["path"], "/api/v1/auth/signin");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_refresh_requires_refresh_token_of_same_user() {
    let app = TestApp::new().await;
    let tokens = app.sign_in("admin", "admin").await;
    let refresh_token = tokens["refresh_token"].as_str().unwrap();

    let (status, body) = app
        .call(Method::PUT, "/api/v1/auth/refresh/admin", Some(refresh_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());

    let (status, _) = app
        .call(Method::PUT, "/api/v1/auth/refresh/admin", Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::PUT, "/api/v1/auth/refresh/someone", Some(refresh_token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_access_token() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/api/v1/companies", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["path"], "/api/v1/companies");

    let (status, _) = app
        .call(Method::GET, "/api/v1/companies", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_operator_reads_and_delivers_but_cannot_edit_master_data() {
    let app = TestApp::new().await;
    let (status, account) = app
        .post(
            "/api/v1/accounts",
            json!({ "username": "operator", "password": "op-secret", "role": "OPERATOR" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{account}");
    assert_eq!(account["role"], "OPERATOR");
    assert!(account.get("password_hash").is_none());

    let tokens = app.sign_in("operator", "op-secret").await;
    let operator = tokens["access_token"].as_str().unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/accounts",
            Some(operator),
            Some(json!({ "username": "intruder", "password": "long-enough", "role": "ADMIN" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    let (status, body) = app
        .post(
            "/api/v1/accounts",
            json!({ "username": "Operator", "password": "another-pass", "role": "OPERATOR" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DUPLICATE_RESOURCE");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/companies",
            Some(operator),
            Some(json!({ "name": "Acme" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    let (status, _) = app
        .call(Method::GET, "/api/v1/equipment", Some(operator), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let user_id = app.create_user("Ana Souza").await;
    let equipment_id = app.create_monitor("MON-OP").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/history/deliver",
            Some(operator),
            Some(json!({ "equipment_id": equipment_id, "user_id": user_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "ACTIVE");
}

#[tokio::test]
async fn test_company_crud_and_duplicate_name() {
    let app = TestApp::new().await;

    let (status, company) = app
        .post("/api/v1/companies", json!({ "name": "Acme", "state": "SP" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = company["id"].as_i64().unwrap();

    let (status, body) = app.post("/api/v1/companies", json!({ "name": "ACME" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DUPLICATE_RESOURCE");

    let (status, body) = app
        .put(&format!("/api/v1/companies/{}", id), json!({ "state": "RJ" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Acme");
    assert_eq!(body["state"], "RJ");

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/v1/companies/{}", id), Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/v1/companies/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["path"], format!("/api/v1/companies/{}", id));
}

#[tokio::test]
async fn test_department_paging() {
    let app = TestApp::new().await;
    for i in 0..25 {
        let (status, _) = app
            .post("/api/v1/departments", json!({ "name": format!("Dept {:02}", i) }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = app.get("/api/v1/departments?page=0&size=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["content"].as_array().unwrap().len(), 10);
    assert_eq!(page["total_elements"], 25);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["page_number"], 0);

    let (_, last) = app
        .get("/api/v1/departments?page=2&size=10&sort=name&direction=desc")
        .await;
    let names: Vec<&str> = last["content"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Dept 04", "Dept 03", "Dept 02", "Dept 01", "Dept 00"]);

    let (status, body) = app.get("/api/v1/departments?sort=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_FAILURE");
}

#[tokio::test]
async fn test_user_deactivate_and_activate() {
    let app = TestApp::new().await;
    let id = app.create_user("Bruno Lima").await;

    let (status, body) = app
        .patch(&format!("/api/v1/users/{}/deactivate", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    let (_, page) = app.get("/api/v1/users?active=false").await;
    assert_eq!(page["total_elements"], 1);

    let (status, body) = app
        .patch(&format!("/api/v1/users/{}/activate", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["active"], true);
}

#[tokio::test]
async fn test_generic_and_typed_equipment_creation() {
    let app = TestApp::new().await;

    let (status, notebook) = app
        .post(
            "/api/v1/equipment",
            json!({
                "type": "NOTEBOOK",
                "asset_tag": "NB-001",
                "serial_number": "SN-NB-001",
                "brand": "Lenovo",
                "value": "4599.90",
                "details": { "hostname": "nb-001", "cpu": "i7", "remote_access": true }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{notebook}");
    assert_eq!(notebook["type"], "NOTEBOOK");
    assert_eq!(notebook["status"], "AVAILABLE");
    assert_eq!(notebook["details"]["hostname"], "nb-001");
    assert_eq!(notebook["details"]["remote_access"], true);

    let (status, chip) = app
        .post(
            "/api/v1/equipment/chips",
            json!({
                "asset_tag": "CH-001",
                "serial_number": "SN-CH-001",
                "iccid": "8955010012345678901",
                "phone_number": "+5511987654321",
                "carrier": "Vivo"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{chip}");
    let chip_id = chip["id"].as_i64().unwrap();

    let (status, fetched) = app.get(&format!("/api/v1/equipment/{}", chip_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["type"], "CHIP");
    assert_eq!(fetched["details"]["iccid"], "8955010012345678901");
    assert!(fetched["details"].get("hostname").is_none());

    let (_, page) = app.get("/api/v1/equipment?type=CHIP").await;
    assert_eq!(page["total_elements"], 1);
}

#[tokio::test]
async fn test_equipment_rejections() {
    let app = TestApp::new().await;
    let chip_id = {
        let (status, body) = app
            .post(
                "/api/v1/equipment/chips",
                json!({ "asset_tag": "CH-9", "serial_number": "SN-CH-9", "carrier": "Tim" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    };

    // kind cannot change on update
    let (status, body) = app
        .put(
            &format!("/api/v1/equipment/notebooks/{}", chip_id),
            json!({ "asset_tag": "CH-9", "serial_number": "SN-CH-9", "hostname": "pc-9" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "TYPE_MISMATCH");

    // serial number already taken
    let (status, body) = app
        .post(
            "/api/v1/equipment/monitors",
            json!({ "asset_tag": "MON-1", "serial_number": "SN-CH-9" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DUPLICATE_RESOURCE");

    // field that no monitor has
    let (status, body) = app
        .post(
            "/api/v1/equipment/monitors",
            json!({ "asset_tag": "MON-2", "serial_number": "SN-MON-2", "imei": "490154203237518" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UNRECOGNIZED_PAYLOAD");

    // unknown type tag
    let (status, body) = app
        .post(
            "/api/v1/equipment",
            json!({ "type": "TABLET", "asset_tag": "T-1", "serial_number": "SN-T-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UNRECOGNIZED_PAYLOAD");

    let (status, body) = app.get("/api/v1/equipment/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "MALFORMED_REQUEST");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/equipment")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "MALFORMED_REQUEST");
}

#[tokio::test]
async fn test_deliver_return_lifecycle() {
    let app = TestApp::new().await;
    let user_id = app.create_user("Carla Dias").await;
    let equipment_id = app.create_monitor("MON-100").await;

    let (status, row) = app
        .post(
            "/api/v1/history/deliver",
            json!({
                "equipment_id": equipment_id,
                "user_id": user_id,
                "delivered_at": "2024-01-01T09:00:00Z",
                "delivery_notes": "with cable"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{row}");
    let history_id = row["id"].as_i64().unwrap();

    let (_, equipment) = app.get(&format!("/api/v1/equipment/{}", equipment_id)).await;
    assert_eq!(equipment["status"], "IN_USE");

    // a second delivery of the same equipment is refused
    let (status, body) = app
        .post(
            "/api/v1/history/deliver",
            json!({ "equipment_id": equipment_id, "user_id": user_id }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "BUSINESS_RULE");

    let (status, row) = app
        .patch(&format!("/api/v1/history/{}/return", history_id), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{row}");
    assert_eq!(row["status"], "RETURNED");
    assert!(row["returned_at"].is_string());

    let (_, equipment) = app.get(&format!("/api/v1/equipment/{}", equipment_id)).await;
    assert_eq!(equipment["status"], "AVAILABLE");

    let (status, _) = app
        .patch(&format!("/api/v1/history/{}/return", history_id), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, page) = app.get(&format!("/api/v1/users/{}/history", user_id)).await;
    assert_eq!(page["total_elements"], 1);
    let (_, page) = app
        .get(&format!("/api/v1/equipment/{}/history", equipment_id))
        .await;
    assert_eq!(page["content"][0]["status"], "RETURNED");
}

#[tokio::test]
async fn test_cancel_requires_reason_and_active_row() {
    let app = TestApp::new().await;
    let user_id = app.create_user("Davi Rocha").await;
    let equipment_id = app.create_monitor("MON-200").await;
    let (_, row) = app
        .post(
            "/api/v1/history/deliver",
            json!({ "equipment_id": equipment_id, "user_id": user_id }),
        )
        .await;
    let history_id = row["id"].as_i64().unwrap();

    let (status, body) = app
        .patch(
            &format!("/api/v1/history/{}/cancel", history_id),
            Some(json!({ "reason": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_FAILURE");

    let (status, body) = app
        .patch(
            &format!("/api/v1/history/{}/cancel", history_id),
            Some(json!({ "reason": "delivered to the wrong person" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(body["cancellation_reason"], "delivered to the wrong person");

    let (status, _) = app
        .patch(
            &format!("/api/v1/history/{}/cancel", history_id),
            Some(json!({ "reason": "again" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_bulk_deliver_and_return_report_each_item() {
    let app = TestApp::new().await;
    let user_id = app.create_user("Elisa Prado").await;
    let first = app.create_monitor("MON-301").await;
    let second = app.create_monitor("MON-302").await;
    let third = app.create_monitor("MON-303").await;

    let (status, result) = app
        .post(
            "/api/v1/history/deliver/bulk",
            json!({
                "items": [
                    { "equipment_id": first, "user_id": user_id, "delivered_at": "2024-03-01T08:00:00Z" },
                    { "equipment_id": 4040, "user_id": user_id },
                    { "equipment_id": second, "user_id": user_id, "delivered_at": "2024-03-01T08:00:00Z" },
                    { "equipment_id": third, "user_id": user_id, "delivered_at": "2024-03-01T08:00:00Z" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["total_items"], 4);
    assert_eq!(result["success_count"], 3);
    assert_eq!(result["error_count"], 1);
    assert_eq!(result["errors"][0]["index"], 1);
    assert_eq!(result["errors"][0]["reference_id"], 4040);

    let ids: Vec<i64> = result["succeeded"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect();

    let (status, result) = app
        .patch(
            "/api/v1/history/return/bulk",
            Some(json!({
                "items": [
                    { "history_id": ids[0] },
                    { "history_id": ids[1], "equipment_status": "MAINTENANCE" },
                    { "history_id": ids[1] }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["success_count"], 2);
    assert_eq!(result["error_count"], 1);
    assert_eq!(result["errors"][0]["index"], 2);

    let (_, equipment) = app.get(&format!("/api/v1/equipment/{}", second)).await;
    assert_eq!(equipment["status"], "MAINTENANCE");
}

#[tokio::test]
async fn test_delivered_user_and_equipment_cannot_be_deleted() {
    let app = TestApp::new().await;
    let user_id = app.create_user("Caio Lima").await;
    let equipment_id = app.create_monitor("MON-DEL").await;

    let (status, body) = app
        .post(
            "/api/v1/history/deliver",
            json!({ "equipment_id": equipment_id, "user_id": user_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let history_id = body["id"].as_i64().unwrap();

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/v1/users/{}", user_id), Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "INTEGRITY_VIOLATION");

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/v1/equipment/{}", equipment_id), Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "INTEGRITY_VIOLATION");

    // closing the delivery does not release the references
    let (status, _) = app
        .patch(&format!("/api/v1/history/{}/return", history_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app
        .call(Method::DELETE, &format!("/api/v1/equipment/{}", equipment_id), Some(&app.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "INTEGRITY_VIOLATION");

    let (status, _) = app.get(&format!("/api/v1/users/{}", user_id)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_equipment_status_follows_deliveries() {
    let app = TestApp::new().await;
    let user_id = app.create_user("Duda Rocha").await;
    let equipment_id = app.create_monitor("MON-STS").await;
    let uri = format!("/api/v1/equipment/monitors/{}", equipment_id);

    let (status, _) = app
        .post(
            "/api/v1/history/deliver",
            json!({ "equipment_id": equipment_id, "user_id": user_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .put(&uri, json!({ "asset_tag": "MON-STS", "serial_number": "SN-MON-STS", "status": "AVAILABLE" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "BUSINESS_RULE");

    let (status, body) = app
        .post(
            "/api/v1/history/deliver",
            json!({ "equipment_id": equipment_id, "user_id": user_id }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "BUSINESS_RULE");

    let (status, body) = app
        .get(&format!("/api/v1/history?equipment_id={}&status=ACTIVE", equipment_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_elements"], 1);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = TestApp::new().await;
    let (status, doc) = app
        .call(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/equipment/{kind}"].is_object());
}
