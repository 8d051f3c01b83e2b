use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

/// Multipart field carrying the optional drink image.
pub const IMAGE_FIELD: &str = "image";

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct AddDrinkForm {
    name: Option<String>,
    ingredients: Option<String>,
    image: Option<Upload>,
}

async fn read_form(mut multipart: Multipart) -> Result<AddDrinkForm, AppError> {
    let mut form = AddDrinkForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => {
                form.name = Some(field.text().await.map_err(|e| AppError::Validation(e.body_text()))?);
            }
            "ingredients" => {
                form.ingredients = Some(field.text().await.map_err(|e| AppError::Validation(e.body_text()))?);
            }
            IMAGE_FIELD => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| AppError::Validation(e.body_text()))?;
                if form.image.is_some() {
                    return Err(AppError::Validation("only one image per drink".into()));
                }
                form.image = Some(Upload { file_name, bytes: bytes.to_vec() });
            }
            _ => {}
        }
    }
    Ok(form)
}

/// `POST /addDrink`: multipart `name`, `ingredients` (JSON text) and an
/// optional `image` file. Text fields are checked before the image is written.
pub async fn add_drink(State(state): State<AppState>, multipart: Multipart) -> Result<StatusCode, AppError> {
    let form = read_form(multipart).await?;
    let (name, ingredients) = match (form.name, form.ingredients) {
        (Some(n), Some(i)) if !n.is_empty() && !i.is_empty() => (n, i),
        _ => return Err(AppError::Validation("Missing data".into())),
    };

    let images = state.catalog.images();
    let image = match &form.image {
        Some(upload) => images.store(&upload.file_name, &upload.bytes).await?,
        None => None,
    };

    if let Err(e) = state.catalog.add(&name, &ingredients, image.clone()).await {
        if let Some(stored) = image.as_deref() {
            warn!(image = %stored, "discarding image of rejected drink");
            images.delete(stored).await;
        }
        return Err(e.into());
    }
    Ok(StatusCode::OK)
}

/// `DELETE /removeDrink/:name`
pub async fn remove_drink(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, AppError> {
    state.catalog.remove(&name).await?;
    Ok(StatusCode::OK)
}
