use axum::{extract::Path, response::Json};
use serde::Serialize;
use serde_json::{Value, json};

use crate::errors::{AppError, AppResult};

/// Model ids accepted by the speech endpoint
pub const SUPPORTED_MODELS: [&str; 3] = ["tts-1", "tts-1-hd", "kokoro"];

const MODEL_CREATED: u64 = 1_686_935_002;

#[derive(Debug, Clone, Serialize)]
pub struct ModelObject {
    pub id: &'static str,
    pub object: &'static str,
    pub created: u64,
    pub owned_by: &'static str,
}

fn model_object(id: &'static str) -> ModelObject {
    ModelObject {
        id,
        object: "model",
        created: MODEL_CREATED,
        owned_by: "kokoro",
    }
}

pub fn is_supported_model(model: &str) -> bool {
    SUPPORTED_MODELS.contains(&model)
}

/// GET /v1/models
pub async fn list_models() -> Json<Value> {
    let data: Vec<ModelObject> = SUPPORTED_MODELS.into_iter().map(model_object).collect();
    Json(json!({
        "object": "list",
        "data": data,
    }))
}

/// GET /v1/models/{model}
pub async fn retrieve_model(Path(model): Path<String>) -> AppResult<Json<ModelObject>> {
    SUPPORTED_MODELS
        .into_iter()
        .find(|id| *id == model)
        .map(|id| Json(model_object(id)))
        .ok_or_else(|| AppError::ModelNotFound(format!("Model '{model}' not found")))
}
