use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::ComposeError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Compose(#[from] ComposeError),
}

impl ApiError {
    /// Stable taxonomy code carried in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MalformedInput(_) => "malformed_input",
            ApiError::Compose(e) => match e {
                ComposeError::MalformedInput(_) => "malformed_input",
                ComposeError::AssetLoad { .. } => "asset_load_failure",
                ComposeError::BackgroundResize(_) => "background_resize_failure",
                ComposeError::Timeout(_) => "timeout",
                ComposeError::Render(_) => "render_failure",
                ComposeError::Internal(_) => "internal",
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedInput(_) | ApiError::Compose(ComposeError::MalformedInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Compose(ComposeError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("SVG parse error: {0}")]
    SvgParse(String),

    #[error("Unsupported dimensions: {width}x{height}")]
    UnsupportedDimensions { width: u32, height: u32 },

    #[error("Failed to allocate pixmap")]
    PixmapAllocation,

    #[error("Image encode error: {0}")]
    Encode(String),

    #[error("PDF encode error: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Render request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Rejected render request");
        }

        let body = Json(json!({
            "status": status.as_u16(),
            "code": self.code(),
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
