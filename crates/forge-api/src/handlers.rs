//! API request handlers for site generation

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use forge_common::palette::DEFAULT_THEME_COLOR;
use forge_common::{CustomizationRequest, DeploymentTarget, DisplayName, Error, Feature, ThemeColor, Upload};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::pipeline::PipelineOutcome;
use crate::AppState;

/// Display name used when the form carries no `name` field
pub const DEFAULT_DISPLAY_NAME: &str = "URL Shortener";

pub const DEPLOYMENT_STATUS_HEADER: &str = "x-deployment-status";
pub const DEPLOYMENT_MESSAGE_HEADER: &str = "x-deployment-message";

const GENERIC_FAILURE: &str = "An error occurred while generating your URL shortener. Please try again.";

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_validation() {
            return ApiError {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
            };
        }
        error!("Generation failed: {}", err);
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: GENERIC_FAILURE.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError {
            status: err.status(),
            message: format!("Invalid form submission: {}", err.body_text()),
        }
    }
}

/// Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "forge-api",
        "startup_complete": state.process.startup_complete()
    }))
}

/// Customization form
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// Generate a branded package from the submitted form
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let request = read_form(multipart).await?;
    info!(
        "Generation requested: {} ({}, {} features)",
        request.display_name(),
        request.target(),
        request.features().len()
    );

    let response = match state.pipeline.run(request).await? {
        PipelineOutcome::Archive { file_name, bytes } => archive_response(&file_name, bytes, HeaderMap::new()),
        PipelineOutcome::Deployed {
            display_name,
            url,
            verified,
        } => Html(deployed_page(&display_name, &url, verified)).into_response(),
        PipelineOutcome::DeploymentFailed {
            file_name,
            bytes,
            message,
        } => {
            let mut headers = HeaderMap::new();
            headers.insert(
                HeaderName::from_static(DEPLOYMENT_STATUS_HEADER),
                HeaderValue::from_static("failed"),
            );
            headers.insert(
                HeaderName::from_static(DEPLOYMENT_MESSAGE_HEADER),
                header_text(&message).unwrap_or_else(|| HeaderValue::from_static("deployment failed")),
            );
            archive_response(&file_name, bytes, headers)
        }
    };
    Ok(response)
}

/// Parse the multipart form into a validated request
async fn read_form(mut multipart: Multipart) -> Result<CustomizationRequest, ApiError> {
    let mut name = None;
    let mut target = None;
    let mut color = None;
    let mut connection_string = None;
    let mut features = Vec::new();
    let mut logo = None;
    let mut favicon = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "logo" | "favicon" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                // An empty file input still submits a part with no file name
                if file_name.is_empty() {
                    continue;
                }
                let upload = Upload::new(file_name, bytes.to_vec())?;
                if field_name == "logo" {
                    logo = Some(upload);
                } else {
                    favicon = Some(upload);
                }
            }
            "name" => name = Some(field.text().await?),
            "deployment_option" => target = Some(field.text().await?),
            "accent_color" => color = Some(field.text().await?),
            "mongodb_uri" => connection_string = Some(field.text().await?),
            "advanced_options" => features.push(field.text().await?),
            other => debug!("Ignoring form field {}", other),
        }
    }

    let display_name = DisplayName::new(name.unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()))?;
    let target: DeploymentTarget = match target.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => value.parse()?,
        _ => DeploymentTarget::Standalone,
    };
    let color: ThemeColor = match color.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => value.parse()?,
        _ => DEFAULT_THEME_COLOR.parse()?,
    };
    let features = features
        .iter()
        .map(|value| value.trim().parse::<Feature>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut builder = CustomizationRequest::builder(display_name, target)
        .theme_color(color)
        .features(features);
    if let Some(value) = connection_string {
        builder = builder.connection_string(value);
    }
    if let Some(upload) = logo {
        builder = builder.logo(upload);
    }
    if let Some(upload) = favicon {
        builder = builder.favicon(upload);
    }
    Ok(builder.build())
}

fn archive_response(file_name: &str, bytes: Vec<u8>, extra: HeaderMap) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    if let Some(value) = header_text(&format!("attachment; filename=\"{}\"", file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.extend(extra);
    (StatusCode::OK, headers, bytes).into_response()
}

/// Header-safe rendition of free text
fn header_text(text: &str) -> Option<HeaderValue> {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .take(300)
        .collect();
    HeaderValue::from_str(cleaned.trim()).ok()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn deployed_page(display_name: &str, url: &str, verified: bool) -> String {
    let name = escape_html(display_name);
    let url = escape_html(url);
    let note = if verified {
        "Your application answered its first request."
    } else {
        "Your application is still starting up. The first visit can take a few minutes."
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{name} deployed</title>
    <style>
        body {{ font-family: Arial, sans-serif; max-width: 640px; margin: 40px auto; }}
        a.button {{ display: inline-block; padding: 10px 20px; background: #3f51b5; color: #fff; text-decoration: none; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>{name} is deployed to Azure</h1>
    <p>{note}</p>
    <p><a class="button" href="{url}">{url}</a></p>
    <p>Manage the application from the <a href="https://portal.azure.com">Azure Portal</a> under App Services.</p>
</body>
</html>
"#
    )
}

const INDEX_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
    <title>URL Shortener Forge</title>
    <style>
        body { font-family: Arial, sans-serif; max-width: 640px; margin: 40px auto; }
        label { display: block; margin-top: 12px; }
    </style>
</head>
<body>
    <h1>Create your URL shortener</h1>
    <form action="/generate" method="post" enctype="multipart/form-data">
        <label>Name <input name="name" required></label>
        <label>Accent color <input type="color" name="accent_color" value="#3f51b5"></label>
        <label>Logo <input type="file" name="logo" accept=".png,.jpg,.jpeg,.gif"></label>
        <label>Favicon <input type="file" name="favicon" accept=".png,.jpg,.jpeg,.gif"></label>
        <label>MongoDB URI <input name="mongodb_uri" value="mongodb://localhost:27017/urlshortener"></label>
        <fieldset>
            <legend>Optional features</legend>
            <label><input type="checkbox" name="advanced_options" value="custom_alias" checked> Custom alias</label>
            <label><input type="checkbox" name="advanced_options" value="password_protection" checked> Password protection</label>
            <label><input type="checkbox" name="advanced_options" value="max_clicks" checked> Click limit</label>
        </fieldset>
        <fieldset>
            <legend>Deployment</legend>
            <label><input type="radio" name="deployment_option" value="standalone" checked> Standalone Python</label>
            <label><input type="radio" name="deployment_option" value="docker"> Docker</label>
            <label><input type="radio" name="deployment_option" value="azure"> Azure App Service</label>
        </fieldset>
        <p><button type="submit">Generate</button></p>
    </form>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_text_replaces_unsafe_characters() {
        let value = header_text("failed at CREATE_APPLICATION:\nname taken \u{2014} retry").unwrap();
        assert_eq!(value.to_str().unwrap(), "failed at CREATE_APPLICATION:_name taken _ retry");
    }

    #[test]
    fn test_deployed_page_escapes_name() {
        let page = deployed_page("<Acme>", "https://acme.azurewebsites.net", false);
        assert!(page.contains("&lt;Acme&gt; is deployed"));
        assert!(page.contains(r#"href="https://acme.azurewebsites.net""#));
        assert!(page.contains("still starting up"));
    }

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let api: ApiError = Error::Validation("Please provide a name".to_string()).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);

        let api: ApiError = Error::Packaging("disk full".to_string()).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, GENERIC_FAILURE);
    }
}
