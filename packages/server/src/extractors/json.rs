use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON body extractor whose rejections surface as `AppError::Validation`,
/// so a bad body gets the same `{"error": ...}` shape as every other 400.
pub struct AppJson<T>(pub T);

fn rejection_message(rejection: JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "The request body must be sent as application/json".to_string()
        }
        JsonRejection::JsonSyntaxError(_) => "The input data is not valid JSON".to_string(),
        other => other.body_text(),
    }
}

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| AppJson(value))
            .map_err(|e| AppError::Validation(rejection_message(e)))
    }
}
