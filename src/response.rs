use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// Envelope shared by every JSON response: `{ "message": ..., "data": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    pub data: Option<T>,
}

pub fn respond<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: T,
) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse {
            message: message.into(),
            data: Some(data),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serialization() {
        let body = ApiResponse {
            message: "ok".to_string(),
            data: Some(serde_json::json!({ "token": "t" })),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message"], "ok");
        assert_eq!(json["data"]["token"], "t");

        let empty: ApiResponse<()> = ApiResponse {
            message: "nothing".to_string(),
            data: None,
        };
        assert!(serde_json::to_value(&empty).unwrap()["data"].is_null());
    }
}
