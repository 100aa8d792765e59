use crate::db::{self, NewOption, OptionPatch, OptionRecord};
use crate::errors::ServiceError;
use crate::models::black76;
use crate::models::PricingInputs;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

type ApiResult<T> = Result<Json<T>, ServiceError>;

#[derive(serde::Deserialize)]
pub struct ListQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidRequest(_) | ServiceError::Pricing(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::Database(_) | ServiceError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, kind = self.kind(), "request rejected");
        }

        let body = serde_json::json!({ "detail": self.to_string(), "kind": self.kind() });
        (status, Json(body)).into_response()
    }
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /options -- store a new option record
pub async fn create_option(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewOption>,
) -> ApiResult<OptionRecord> {
    Ok(Json(db::insert_option(&state.db, &new)?))
}

/// GET /options -- one page of records, ordered by id
pub async fn list_options(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> ApiResult<Vec<OptionRecord>> {
    let max = state.config.max_page_limit;
    let limit = params.limit.unwrap_or(max);
    if limit > max {
        return Err(ServiceError::InvalidRequest(format!("limit must be at most {max}")));
    }
    let offset = params.offset.unwrap_or(0);
    Ok(Json(db::list_options(&state.db, offset, limit)?))
}

/// GET /options/{id}
pub async fn read_option(
    State(state): State<Arc<AppState>>,
    Path(option_id): Path<i64>,
) -> ApiResult<OptionRecord> {
    db::get_option(&state.db, option_id)?
        .map(Json)
        .ok_or(ServiceError::NotFound("Option"))
}

/// PATCH /options/{id} -- only the supplied fields change
pub async fn update_option(
    State(state): State<Arc<AppState>>,
    Path(option_id): Path<i64>,
    Json(patch): Json<OptionPatch>,
) -> ApiResult<OptionRecord> {
    db::update_option(&state.db, option_id, &patch)?
        .map(Json)
        .ok_or(ServiceError::NotFound("Option"))
}

/// DELETE /options/{id}
pub async fn delete_option(
    State(state): State<Arc<AppState>>,
    Path(option_id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    if db::delete_option(&state.db, option_id)? {
        Ok(Json(serde_json::json!({ "deleted": true })))
    } else {
        Err(ServiceError::NotFound("Option"))
    }
}

/// PATCH /options_black76/{id} -- price the stored record and persist the result
pub async fn store_black76_price(
    State(state): State<Arc<AppState>>,
    Path(option_id): Path<i64>,
) -> ApiResult<OptionRecord> {
    let priced_at = chrono::Utc::now().to_rfc3339();
    let record = db::reprice_option(&state.db, option_id, &priced_at, |record| {
        Ok(black76::price_inputs(&PricingInputs::from(record))?)
    })?
    .ok_or(ServiceError::NotFound("Option"))?;

    tracing::info!(id = option_id, price = ?record.black76_price, "black-76 price computed");
    Ok(Json(record))
}

/// POST /black76 -- stateless quote; nothing is stored
pub async fn quote_black76(Json(inputs): Json<PricingInputs>) -> ApiResult<serde_json::Value> {
    let price = black76::price_inputs(&inputs)?;
    Ok(Json(serde_json::json!({ "price": price })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::DbPool;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn make_app() -> (Router, DbPool) {
        let db = db::init_memory_db().unwrap();
        let state = AppState::new(AppConfig::default(), db.clone());
        (crate::server::router(state), db)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_string(&v).unwrap())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn new_option(name: &str, strike: f64, future_price: f64, option_type: &str) -> NewOption {
        NewOption {
            name: name.into(),
            strike,
            time_to_maturity: 1.5,
            risk_free_rate: 1.5,
            volatility: 2.0,
            future_price,
            option_type: option_type.into(),
            black76_price: None,
        }
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = make_app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_option() {
        let (app, _) = make_app();
        let (status, data) = send(
            &app,
            "POST",
            "/options",
            Some(json!({
                "name": "test_option1", "strike": 10, "maturity": 1.5, "risk_free_rate": 1.5,
                "volatility": 2, "future_price": 10, "option_type": "call"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(data["name"], "test_option1");
        assert_eq!(data["strike"], 10.0);
        assert_eq!(data["time_to_maturity"], 1.5);
        assert_eq!(data["risk_free_rate"], 1.5);
        assert_eq!(data["volatility"], 2.0);
        assert_eq!(data["future_price"], 10.0);
        assert_eq!(data["option_type"], "call");
        assert!(data["id"].is_i64());
        assert!(data["black76_price"].is_null());
    }

    #[tokio::test]
    async fn test_incomplete_option_rejected() {
        let (app, _) = make_app();
        let (status, _) = send(
            &app,
            "POST",
            "/options",
            Some(json!({
                "name": "test_option1", "maturity": 1.5, "risk_free_rate": 1.5,
                "volatility": 2, "future_price": 10
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_invalid_field_type_rejected() {
        let (app, _) = make_app();
        let (status, _) = send(
            &app,
            "POST",
            "/options",
            Some(json!({
                "name": "test_option1", "strike": 10, "maturity": 1.5, "risk_free_rate": 1.5,
                "volatility": "really volatile", "future_price": 10, "option_type": "call"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_read_options() {
        let (app, db) = make_app();
        let first = db::insert_option(&db, &new_option("opt1", 12.0, 10.0, "call")).unwrap();
        let second = db::insert_option(&db, &new_option("opt2", 11.0, 10.0, "put")).unwrap();

        let (status, data) = send(&app, "GET", "/options", None).await;
        assert_eq!(status, StatusCode::OK);
        let rows = data.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], first.id);
        assert_eq!(rows[0]["strike"], 12.0);
        assert_eq!(rows[0]["option_type"], "call");
        assert_eq!(rows[1]["id"], second.id);
        assert_eq!(rows[1]["option_type"], "put");

        let (status, data) = send(&app, "GET", "/options?offset=1&limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data.as_array().unwrap().len(), 1);
        assert_eq!(data[0]["name"], "opt2");
    }

    #[tokio::test]
    async fn test_list_limit_capped() {
        let (app, _) = make_app();
        let (status, body) = send(&app, "GET", "/options?limit=101", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn test_list_offset_beyond_range() {
        let (app, db) = make_app();
        db::insert_option(&db, &new_option("opt1", 12.0, 10.0, "call")).unwrap();

        let (status, body) = send(&app, "GET", "/options?offset=18446744073709551615", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "invalid_request");

        let (status, body) = send(&app, "GET", "/options?offset=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_option() {
        let (app, db) = make_app();
        let rec = db::insert_option(&db, &new_option("opt1", 12.0, 10.0, "call")).unwrap();

        let (status, data) = send(&app, "GET", &format!("/options/{}", rec.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data["id"], rec.id);
        assert_eq!(data["name"], "opt1");

        let (status, data) = send(&app, "GET", "/options/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(data["detail"], "Option not found");
    }

    #[tokio::test]
    async fn test_update_option() {
        let (app, db) = make_app();
        let rec = db::insert_option(&db, &new_option("opt1", 12.0, 10.0, "call")).unwrap();

        let (status, data) = send(
            &app,
            "PATCH",
            &format!("/options/{}", rec.id),
            Some(json!({ "volatility": 0.3, "option_type": "put" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data["volatility"], 0.3);
        assert_eq!(data["option_type"], "put");
        assert_eq!(data["name"], "opt1");

        let (status, _) = send(&app, "PATCH", "/options/999", Some(json!({ "name": "x" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_option() {
        let (app, db) = make_app();
        let rec = db::insert_option(&db, &new_option("opt1", 12.0, 10.0, "call")).unwrap();

        let (status, data) = send(&app, "DELETE", &format!("/options/{}", rec.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data["deleted"], true);
        assert!(db::get_option(&db, rec.id).unwrap().is_none());

        let (status, _) = send(&app, "DELETE", &format!("/options/{}", rec.id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_store_black76_price() {
        let (app, db) = make_app();
        let rec = db::insert_option(
            &db,
            &NewOption {
                name: "atm".into(),
                strike: 42.0,
                time_to_maturity: 1.5,
                risk_free_rate: 0.05,
                volatility: 0.2,
                future_price: 42.0,
                option_type: "call".into(),
                black76_price: None,
            },
        )
        .unwrap();

        let (status, data) = send(&app, "PATCH", &format!("/options_black76/{}", rec.id), None).await;
        assert_eq!(status, StatusCode::OK);
        let price = data["black76_price"].as_f64().unwrap();
        assert!((price - 3.798).abs() < 5e-4, "price={price}");
        assert!(data["priced_at"].is_string());

        let stored = db::get_option(&db, rec.id).unwrap().unwrap();
        assert_eq!(stored.black76_price, Some(price));
    }

    #[tokio::test]
    async fn test_store_black76_price_errors() {
        let (app, db) = make_app();
        let (status, _) = send(&app, "PATCH", "/options_black76/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let bad_type = db::insert_option(&db, &new_option("swap", 10.0, 10.0, "swap")).unwrap();
        let (status, body) =
            send(&app, "PATCH", &format!("/options_black76/{}", bad_type.id), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "invalid_option_type");

        let negative = db::insert_option(&db, &new_option("neg", 10.0, -10.0, "CALL")).unwrap();
        let (status, body) =
            send(&app, "PATCH", &format!("/options_black76/{}", negative.id), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "non_positive_value");
        assert!(db::get_option(&db, negative.id).unwrap().unwrap().black76_price.is_none());
    }

    #[tokio::test]
    async fn test_quote_black76() {
        let (app, _) = make_app();
        let (status, body) = send(
            &app,
            "POST",
            "/black76",
            Some(json!({
                "future_price": 42, "strike": 42, "time_to_maturity": 1.5,
                "risk_free_rate": 0.05, "volatility": 0.2, "option_type": "Put"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let price = body["price"].as_f64().unwrap();
        assert!((3.78..=3.80).contains(&price), "price={price}");
    }

    #[tokio::test]
    async fn test_quote_black76_error_kinds() {
        let (app, _) = make_app();
        let cases = [
            (
                json!({ "future_price": 42, "strike": 42, "time_to_maturity": null,
                        "risk_free_rate": 0.05, "volatility": 0.2, "option_type": "call" }),
                "missing_value",
            ),
            (
                json!({ "future_price": 42, "strike": "42", "time_to_maturity": 1.5,
                        "risk_free_rate": 0.05, "volatility": 0.2, "option_type": "call" }),
                "type_mismatch",
            ),
            (
                json!({ "future_price": 42, "strike": 42, "time_to_maturity": 1.5,
                        "risk_free_rate": 0.05, "volatility": 0.2, "option_type": "swap" }),
                "invalid_option_type",
            ),
            (
                json!({ "future_price": -42, "strike": 42, "time_to_maturity": 1.5,
                        "risk_free_rate": 0.05, "volatility": 0.2, "option_type": "call" }),
                "non_positive_value",
            ),
        ];

        for (body, kind) in cases {
            let (status, resp) = send(&app, "POST", "/black76", Some(body)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{kind}");
            assert_eq!(resp["kind"], kind);
        }
    }
}
