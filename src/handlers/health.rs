use serde::Serialize;

use super::response::{success, ApiResult};

#[derive(Serialize)]
pub struct Health {
    healthy: bool,
}

// GET /health
pub async fn health() -> ApiResult<Health> {
    success(Health { healthy: true })
}
