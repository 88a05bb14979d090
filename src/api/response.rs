use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use log::error;
use serde::Serialize;

use crate::models::envelope::ApiEnvelope;
use crate::utils::error::{AppError, AppResult};

/// Envelope for a failed request; the HTTP status mirrors the envelope code
pub fn error_response(err: &AppError) -> HttpResponse {
    let code = err.code();
    if code >= 500 {
        error!("Request failed: {}", err);
    }
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(ApiEnvelope::<()>::error(code, err.to_string()))
}

/// Wrap a handler result in the `{code, message, data}` envelope
pub fn respond<T: Serialize>(result: AppResult<T>) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Ok().json(ApiEnvelope::ok(data)),
        Err(e) => error_response(&e),
    }
}

/// Like [`respond`] but answers `201 Created` on success
pub fn respond_created<T: Serialize>(result: AppResult<T>, message: &str) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Created().json(ApiEnvelope::ok_with_message(data, message)),
        Err(e) => error_response(&e),
    }
}
