use crate::{
    error::{AppError, AppResult},
    forms::Fields,
};
use axum::{body::Bytes, extract::Multipart};

pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

pub struct MultipartForm {
    pub fields: Fields,
    pub file: Option<Upload>,
}

/// Reads every text field plus the file sent under `file_field`.
/// An empty file input counts as no upload.
pub async fn read_form(mut multipart: Multipart, file_field: &str) -> AppResult<MultipartForm> {
    let mut fields = Fields::default();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(AppError::bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(AppError::bad_request)?;
            if !bytes.is_empty() {
                file = Some(Upload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
        } else {
            let value = field.text().await.map_err(AppError::bad_request)?;
            fields.insert(name, value);
        }
    }

    Ok(MultipartForm { fields, file })
}
