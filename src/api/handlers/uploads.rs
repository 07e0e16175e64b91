//! Admin uploads into the public web root.
//!
//! Files land in `<public_root>/uploads/<folder>/` under a random name and are
//! served back as static files from `/uploads`.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Multipart},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info};
use utoipa::ToSchema;

use super::{
    auth::{AuthState, Permission, principal::require_permission},
    submissions::{StoragePaths, random_hex, safe_extension},
};

pub const UPLOADS_DIR: &str = "uploads";
const DEFAULT_FOLDER: &str = "cms";

/// Multipart layout of the upload form (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String)]
    file: Vec<u8>,
    /// Sub-folder under `/uploads`; defaults to `cms`.
    folder: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    /// Public URL, e.g. `/uploads/cms/<name>.png`.
    pub url: String,
}

/// Keep only path segments made of ASCII letters, digits, `_`, and `-`.
fn sanitize_folder(raw: Option<&str>) -> String {
    let segment = Regex::new(r"^[A-Za-z0-9_-]+$");
    let segments: Vec<&str> = raw
        .unwrap_or_default()
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|part| {
            segment
                .as_ref()
                .is_ok_and(|segment| segment.is_match(part))
        })
        .collect();
    if segments.is_empty() {
        DEFAULT_FOLDER.to_string()
    } else {
        segments.join("/")
    }
}

struct UploadedFile {
    file_name: String,
    bytes: Bytes,
}

async fn read_upload(
    mut multipart: Multipart,
) -> Result<(Option<UploadedFile>, Option<String>), Response> {
    let mut file = None;
    let mut folder = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err((err.status(), err.body_text()).into_response()),
        };
        let name = field.name().unwrap_or_default().to_ascii_lowercase();
        let result = match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                field.bytes().await.map(|bytes| {
                    file = Some(UploadedFile { file_name, bytes });
                })
            }
            "folder" => field.text().await.map(|text| folder = Some(text)),
            _ => Ok(()),
        };
        if let Err(err) = result {
            return Err((err.status(), err.body_text()).into_response());
        }
    }
    Ok((file, folder))
}

#[utoipa::path(
    post,
    path = "/api/uploads/file",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Stored; public URL returned.", body = UploadResponse),
        (status = 400, description = "No file, or an empty one.", body = String),
        (status = 401, description = "Missing or invalid token."),
        (status = 403, description = "Admin only."),
        (status = 413, description = "Body larger than 20 MiB."),
    ),
    security(("bearer" = [])),
    tag = "uploads"
)]
/// Store an image or file for CMS content and return its public URL.
pub async fn upload_file(
    headers: HeaderMap,
    auth: Extension<Arc<AuthState>>,
    storage: Extension<Arc<StoragePaths>>,
    multipart: Multipart,
) -> Response {
    if let Err(status) = require_permission(&headers, &auth, Permission::PublicUploads) {
        return status.into_response();
    }

    let (file, folder) = match read_upload(multipart).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    let Some(file) = file.filter(|file| !file.bytes.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "file is required.").into_response();
    };

    let folder = sanitize_folder(folder.as_deref());
    let dir: PathBuf = storage.public_root.join(UPLOADS_DIR).join(&folder);
    let stored = format!("{}{}", random_hex(), safe_extension(&file.file_name));

    let written = async {
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&stored), &file.bytes).await
    }
    .await;
    if let Err(err) = written {
        error!("Failed to store public upload: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let url = format!("/{UPLOADS_DIR}/{folder}/{stored}");
    info!(%url, size = file.bytes.len(), "Public upload stored");
    Json(UploadResponse { url }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        handlers::auth::Role,
        testing::{TestApp, multipart_request},
    };

    #[test]
    fn folder_defaults_to_cms() {
        assert_eq!(sanitize_folder(None), "cms");
        assert_eq!(sanitize_folder(Some("   ")), "cms");
        assert_eq!(sanitize_folder(Some("../..")), "cms");
    }

    #[test]
    fn folder_keeps_safe_segments_only() {
        assert_eq!(sanitize_folder(Some("cms/hero")), "cms/hero");
        assert_eq!(sanitize_folder(Some("..\\artists//a b/photos_2025")), "artists/photos_2025");
        assert_eq!(sanitize_folder(Some("/etc/../passwd")), "etc/passwd");
    }

    #[tokio::test]
    async fn uploads_are_admin_only() -> anyhow::Result<()> {
        let app = TestApp::new()?;
        let files = [("file", "logo.png", b"png".as_slice())];

        let (status, _) = app
            .send(multipart_request("/api/uploads/file", None, &[], &files)?)
            .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let editor = app.bearer(Role::Editor)?;
        let (status, _) = app
            .send(multipart_request("/api/uploads/file", Some(&editor), &[], &files)?)
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn empty_or_missing_file_is_rejected() -> anyhow::Result<()> {
        let app = TestApp::new()?;
        let admin = app.bearer(Role::Admin)?;
        for files in [vec![], vec![("file", "empty.png", b"".as_slice())]] {
            let (status, body) = app
                .send(multipart_request(
                    "/api/uploads/file",
                    Some(&admin),
                    &[("folder", "cms")],
                    &files,
                )?)
                .await?;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, "file is required.");
        }
        Ok(())
    }

    #[tokio::test]
    async fn upload_lands_in_public_root_and_is_served() -> anyhow::Result<()> {
        let app = TestApp::new()?;
        let admin = app.bearer(Role::Admin)?;
        let (status, body) = app
            .send(multipart_request(
                "/api/uploads/file",
                Some(&admin),
                &[("folder", "../artists/hero")],
                &[("file", "Cover Art.png", b"not really a png".as_slice())],
            )?)
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");

        let response: UploadResponse = serde_json::from_str(&body)?;
        let name = response
            .url
            .strip_prefix("/uploads/artists/hero/")
            .ok_or_else(|| anyhow::anyhow!("unexpected url {}", response.url))?;
        assert_eq!(name.len(), 32 + ".png".len());
        assert!(name.ends_with(".png"));

        let stored = app
            .storage
            .path()
            .join("public/uploads/artists/hero")
            .join(name);
        assert_eq!(tokio::fs::read(&stored).await?, b"not really a png");

        let (status, served) = app
            .send(crate::api::testing::request("GET", &response.url, None)?)
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(served, "not really a png");
        Ok(())
    }
}
