//! Thin client for the external file-hosting service. Uploads return a
//! public URL plus a handle the service accepts for deletion later; the
//! bytes themselves never live on this server.

use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct HostedFile {
    pub file_name: String,
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    url: String,
    public_id: String,
}

fn hosting_base_url() -> String {
    std::env::var("FILE_HOSTING_URL").unwrap_or_else(|_| "http://localhost:9000/educate".to_string())
}

fn hosted_file_name(original_name: &str) -> String {
    let extension = std::path::Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    format!("resources/{}.{}", Uuid::new_v4(), extension)
}

pub async fn upload(original_name: &str, mime_type: &str, data: &[u8]) -> AppResult<HostedFile> {
    let file_name = hosted_file_name(original_name);

    let part = reqwest::multipart::Part::bytes(data.to_vec())
        .file_name(file_name.clone())
        .mime_str(mime_type)
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let form = reqwest::multipart::Form::new()
        .text("publicId", file_name.clone())
        .part("file", part);

    let response = reqwest::Client::new()
        .post(format!("{}/upload", hosting_base_url()))
        .multipart(form)
        .send()
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AppError::Storage(format!(
            "upload failed with status {}",
            response.status()
        )));
    }

    let uploaded: UploadResponse = response
        .json()
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    Ok(HostedFile {
        file_name,
        url: uploaded.url,
        public_id: uploaded.public_id,
    })
}

pub async fn delete_hosted_file(public_id: &str) -> Result<(), reqwest::Error> {
    reqwest::Client::new()
        .delete(format!("{}/files/{}", hosting_base_url(), public_id))
        .send()
        .await?
        .error_for_status()?;

    Ok(())
}
