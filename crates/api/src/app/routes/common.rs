use std::collections::HashMap;

use axum::extract::Multipart;
use axum::http::StatusCode;

use crate::app::errors::json_error;
use crate::app::services::UploadedFile;

/// Text fields and files of a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, axum::response::Response> {
        let mut form = Self::default();
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => return Err(bad_multipart(e)),
            };
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match field.file_name().map(str::to_owned) {
                Some(filename) => {
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    // An empty file input is sent as a nameless, empty part.
                    if !filename.is_empty() && !bytes.is_empty() {
                        form.files.insert(name, UploadedFile { filename, bytes });
                    }
                }
                None => {
                    let text = field.text().await.map_err(bad_multipart)?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &'static str) -> Result<String, axum::response::Response> {
        self.fields.get(name).cloned().ok_or_else(|| {
            json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("missing field `{name}`"),
            )
        })
    }

    pub fn number<T: std::str::FromStr>(&self, name: &'static str) -> Result<T, axum::response::Response> {
        self.text(name)?.trim().parse().map_err(|_| {
            json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("field `{name}` must be a non-negative integer"),
            )
        })
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_multipart", err.body_text())
}
