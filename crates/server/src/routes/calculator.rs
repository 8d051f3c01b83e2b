use axum::{extract::State, Json};
use serde_json::Value;

use crate::errors::AppError;
use crate::state::AppState;

/// `POST /save-calculator-json`: back up the previous blob, then replace it.
pub async fn save_calculator_json(
    State(state): State<AppState>,
    Json(blob): Json<Value>,
) -> Result<&'static str, AppError> {
    let outcome = state.calculator.save(&blob).await.map_err(AppError::SaveFailed)?;
    if outcome.backed_up() {
        Ok("Saved successfully (backup created)")
    } else {
        Ok("Saved successfully")
    }
}
