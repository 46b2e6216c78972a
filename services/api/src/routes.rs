use crate::infra::{AppState, InMemoryHuntCatalog};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use snaphunt::workflows::submission::{
    submission_router, CompletionLedger, HuntCatalog, HuntId, ImageFormat, ObjectStore, PhotoHunt,
    PhotoSubmissionService, ValidationOracle,
};
use std::sync::Arc;
use uuid::Uuid;

/// Shared handles for the internal hunt registration endpoint. Stands in
/// for the external hunt catalog service until that integration lands.
#[derive(Clone)]
pub(crate) struct HuntRegistry {
    pub(crate) catalog: Arc<InMemoryHuntCatalog>,
    pub(crate) store: Arc<dyn ObjectStore>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HuntRegistrationRequest {
    #[serde(default)]
    pub(crate) id: Option<String>,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) hint: String,
    #[serde(default)]
    pub(crate) difficulty: Option<f32>,
    pub(crate) reference_image_base64: String,
}

pub(crate) fn with_submission_routes<C, S, O, L>(
    service: Arc<PhotoSubmissionService<C, S, O, L>>,
) -> axum::Router
where
    C: HuntCatalog + 'static,
    S: ObjectStore + 'static,
    O: ValidationOracle + 'static,
    L: CompletionLedger + 'static,
{
    submission_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/internal/hunts",
            axum::routing::post(register_hunt_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn register_hunt_endpoint(
    Extension(registry): Extension<HuntRegistry>,
    Json(payload): Json<HuntRegistrationRequest>,
) -> Response {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(&payload.reference_image_base64)
    {
        Ok(bytes) => bytes,
        Err(err) => {
            let body = json!({
                "error": format!("reference_image_base64 is not valid base64: {err}"),
                "kind": "invalid_base64",
            });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    // Storage writes go through the blocking gateway client.
    let result = tokio::task::spawn_blocking(move || {
        let Some(format) = ImageFormat::sniff(&bytes) else {
            let body = json!({
                "error": "reference image bytes are not a supported image format",
                "kind": "unsupported_image",
            });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
        };

        let reference_image = match registry.store.put(&bytes, format) {
            Ok(key) => key,
            Err(err) => {
                let body = json!({
                    "error": err.to_string(),
                    "kind": "storage_failure",
                });
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
            }
        };

        let hunt = PhotoHunt {
            id: HuntId(payload.id.unwrap_or_else(|| Uuid::new_v4().to_string())),
            name: payload.name,
            description: payload.description,
            reference_image: reference_image.clone(),
            difficulty: payload.difficulty,
            hint: payload.hint,
            is_active: true,
        };
        let id = hunt.id.clone();
        registry.catalog.insert(hunt);

        let body = json!({
            "id": id,
            "reference_image": reference_image,
        });
        (StatusCode::CREATED, Json(body)).into_response()
    })
    .await;

    match result {
        Ok(response) => response,
        Err(join) => {
            let body = json!({
                "error": join.to_string(),
                "kind": "internal",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryObjectStore;

    fn registry() -> (Arc<InMemoryHuntCatalog>, Arc<InMemoryObjectStore>, HuntRegistry) {
        let catalog = Arc::new(InMemoryHuntCatalog::default());
        let store = Arc::new(InMemoryObjectStore::default());
        let registry = HuntRegistry {
            catalog: catalog.clone(),
            store: store.clone(),
        };
        (catalog, store, registry)
    }

    fn jpeg_base64() -> String {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9];
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn register_hunt_makes_the_hunt_discoverable() {
        let (catalog, store, registry) = registry();
        let request = HuntRegistrationRequest {
            id: Some("hunt-42".to_string()),
            name: "Mural wall".to_string(),
            description: "Painted brick wall downtown".to_string(),
            hint: "Look west".to_string(),
            difficulty: Some(1.5),
            reference_image_base64: jpeg_base64(),
        };

        let response = register_hunt_endpoint(Extension(registry), Json(request)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let hunt = catalog
            .hunt(&HuntId("hunt-42".to_string()))
            .expect("catalog readable")
            .expect("hunt registered");
        assert_eq!(hunt.name, "Mural wall");
        assert!(hunt.is_active);
        assert!(store.contains(&hunt.reference_image));
    }

    #[tokio::test]
    async fn register_hunt_rejects_non_image_payloads() {
        let (_, store, registry) = registry();
        let request = HuntRegistrationRequest {
            id: None,
            name: "Bad upload".to_string(),
            description: String::new(),
            hint: String::new(),
            difficulty: None,
            reference_image_base64: base64::engine::general_purpose::STANDARD
                .encode(b"plain text"),
        };

        let response = register_hunt_endpoint(Extension(registry), Json(request)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn register_hunt_rejects_garbage_base64() {
        let (_, _, registry) = registry();
        let request = HuntRegistrationRequest {
            id: None,
            name: "Bad encoding".to_string(),
            description: String::new(),
            hint: String::new(),
            difficulty: None,
            reference_image_base64: "not-base64!!!".to_string(),
        };

        let response = register_hunt_endpoint(Extension(registry), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
