use axum::Json;
use serde::Serialize;

use crate::errors::AppError;

/// Success envelope: `{"status": "success", "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        status: "success",
        data,
    }))
}
