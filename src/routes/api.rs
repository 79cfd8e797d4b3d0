//! JSON intake for the mobile application.

use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;

use crate::{errors::AppError, state::AppState};

use super::public::{create_application, BookingFields};

#[derive(Deserialize)]
struct ApplicationPayload {
    name: String,
    phone: String,
    #[serde(rename = "carBrand")]
    car_brand: String,
    #[serde(rename = "carModel")]
    car_model: String,
    date: String,
    time: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/applications").route(web::post().to(create)));
}

async fn create(
    state: web::Data<AppState>,
    payload: web::Json<ApplicationPayload>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    let fields = BookingFields {
        name: payload.name,
        phone: payload.phone,
        car_brand: payload.car_brand,
        car_model: payload.car_model,
        date: payload.date,
        time: payload.time,
    };

    match create_application(&state, fields, "Submitted from the mobile app").await {
        Ok(row) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "application_id": row.id,
            "data": {
                "name": row.name,
                "phone": row.phone,
                "carBrand": row.car_brand,
                "carModel": row.car_model,
                "date": row.desired_date,
                "time": row.desired_time,
                "status": row.status,
            }
        }))),
        Err(AppError::Validation(messages)) => Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": messages.join(" ")
        }))),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};

    use crate::state::AppState;

    #[actix_web::test]
    async fn valid_payload_creates_an_application() {
        let (_dir, state) = AppState::for_tests().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(super::configure),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/api/applications")
            .set_json(json!({
                "name": "Ivan Petrov",
                "phone": "8 (999) 123-45-67",
                "carBrand": "Lada",
                "carModel": "Vesta",
                "date": "2026-08-10",
                "time": "10:30"
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["phone"], json!("+79991234567"));
        assert!(body["application_id"].is_string());

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[actix_web::test]
    async fn invalid_phone_is_rejected_without_a_row() {
        let (_dir, state) = AppState::for_tests().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(super::configure),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/api/applications")
            .set_json(json!({
                "name": "Ivan Petrov",
                "phone": "not a phone",
                "carBrand": "Lada",
                "carModel": "Vesta",
                "date": "2026-08-10",
                "time": "10:30"
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["success"], json!(false));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }
}
