use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::header,
    response::Json,
    Form,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::{AttributeMap, SceneDocument};
use crate::services::{ComposeError, Compositor, RenderOptions, RenderWarning};

/// Body of `POST /canvas-img`, as form fields or a JSON object.
///
/// The editor posts `json` and `attributes` as JSON-encoded strings; JSON
/// clients may send them inline.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CanvasRequest {
    /// Scene document (object or JSON string)
    #[serde(default)]
    #[schema(value_type = Object)]
    pub json: Value,
    /// Attribute map (object, JSON string, or doubly encoded JSON string)
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: Value,
    /// `"true"` to also store the raster as a server-local PNG
    #[serde(default, rename = "imgBackEnd")]
    #[schema(value_type = Option<String>)]
    pub img_back_end: Value,
    /// `"true"` to also return a one-page PDF
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub pdf: Value,
}

impl CanvasRequest {
    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            emit_pdf: is_set(&self.pdf),
            rasterize_to_file: is_set(&self.img_back_end),
        }
    }
}

/// A flag is set by JSON `true` or the string `"true"`.
fn is_set(flag: &Value) -> bool {
    match flag {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

#[async_trait]
impl<S> FromRequest<S> for CanvasRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(body) = Json::<CanvasRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedInput(e.body_text()))?;
            Ok(body)
        } else {
            let Form(body) = Form::<CanvasRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedInput(e.body_text()))?;
            Ok(body)
        }
    }
}

/// Successful render
#[derive(Debug, Serialize, ToSchema)]
pub struct CanvasResponse {
    /// Flattened raster as a `data:image/jpeg;base64,...` URI
    pub image: String,
    /// One-page PDF as a `data:application/pdf;base64,...` URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    /// Path of the stored PNG, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Per-node asset failures that did not abort the render
    pub warnings: Vec<RenderWarning>,
}

/// Error body for failed renders
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status: u16,
    /// Error taxonomy code
    pub code: String,
    /// Error message
    pub error: String,
}

/// Render a scene
///
/// Substitutes `<%...%>` placeholders from `attributes`, swaps logo
/// placeholders for images, composites the barcode and returns the result as
/// a JPEG data URI.
#[utoipa::path(
    post,
    path = "/canvas-img",
    request_body(content = CanvasRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Scene rendered", body = CanvasResponse),
        (status = 400, description = "Scene or attributes could not be parsed", body = ErrorResponse),
        (status = 500, description = "Asset, resize or render failure", body = ErrorResponse),
        (status = 504, description = "Render timed out", body = ErrorResponse),
    ),
    tag = "Render"
)]
pub async fn handle_canvas_img(
    State(compositor): State<Arc<Compositor>>,
    request: CanvasRequest,
) -> Result<Json<CanvasResponse>, ApiError> {
    let options = request.options();
    let scene = SceneDocument::from_value(request.json).map_err(ComposeError::from)?;
    let attributes = AttributeMap::parse(request.attributes).map_err(ComposeError::from)?;

    tracing::info!(
        width = scene.width,
        height = scene.height,
        objects = scene.objects.len(),
        pdf = options.emit_pdf,
        to_file = options.rasterize_to_file,
        "Rendering scene"
    );

    let rendered = compositor.render(&scene, &attributes, options).await?;

    Ok(Json(CanvasResponse {
        image: rendered.image_data_uri(),
        pdf: rendered.pdf_data_uri(),
        file: rendered.file.as_ref().map(|p| p.display().to_string()),
        warnings: rendered.warnings,
    }))
}
