//! services/api/src/web/multipart.rs
//!
//! Reads `multipart/form-data` bodies into text fields and uploaded files.

use crate::error::ApiError;
use axum::extract::Multipart;
use procurement_core::UploadedFile;
use std::collections::HashMap;
use tracing::debug;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// The parts of one multipart body. Text fields may repeat.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    files: Vec<(String, UploadedFile)>,
}

/// Drains the request body. File parts are recognised by their `filename`.
pub async fn read_form(mut multipart: Multipart) -> Result<FormData, ApiError> {
    let mut form = FormData::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let mime_type = field.content_type().unwrap_or(DEFAULT_MIME_TYPE).to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read file '{}': {}", name, e))
                })?;
                // Browsers send an empty part for a file input left blank.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                debug!(field = %name, file_name = %file_name, size = bytes.len(), "Received file");
                form.files.push((
                    name,
                    UploadedFile {
                        file_name,
                        mime_type,
                        bytes: bytes.to_vec(),
                    },
                ));
            }
            None => {
                let text = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read field '{}': {}", name, e))
                })?;
                form.fields.entry(name).or_default().push(text);
            }
        }
    }

    Ok(form)
}

impl FormData {
    /// The first value of a text field, trimmed; empty when absent.
    pub fn text(&self, key: &str) -> String {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    /// Like [`FormData::text`], but `None` for absent or blank fields.
    pub fn optional(&self, key: &str) -> Option<String> {
        Some(self.text(key)).filter(|v| !v.is_empty())
    }

    /// A list field. Accepts repeated fields (`key` or `key[]`), JSON arrays, or both.
    pub fn list(&self, key: &str) -> Vec<String> {
        let bracketed = format!("{key}[]");
        let mut items = Vec::new();
        for raw in [key, bracketed.as_str()]
            .into_iter()
            .filter_map(|k| self.fields.get(k))
            .flatten()
        {
            let raw = raw.trim();
            if raw.starts_with('[') {
                if let Ok(parsed) = serde_json::from_str::<Vec<String>>(raw) {
                    items.extend(parsed);
                    continue;
                }
            }
            if !raw.is_empty() {
                items.push(raw.to_string());
            }
        }
        items.retain(|item| !item.trim().is_empty());
        items
    }

    /// Removes and returns the first file submitted under `name`.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let index = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(index).1)
    }

    /// Every remaining file with the field it was submitted under.
    pub fn into_files(self) -> Vec<(String, UploadedFile)> {
        self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        let mut form = FormData::default();
        for (k, v) in pairs {
            form.fields.entry(k.to_string()).or_default().push(v.to_string());
        }
        form
    }

    #[test]
    fn lists_accept_json_and_repeated_fields() {
        let form = form(&[
            ("productsServices", r#"["Solar installation", "Maintenance"]"#),
            ("productsServices[]", "Consulting"),
            ("deliverables", "Site survey"),
            ("deliverables", " "),
        ]);

        assert_eq!(
            form.list("productsServices"),
            ["Solar installation", "Maintenance", "Consulting"]
        );
        assert_eq!(form.list("deliverables"), ["Site survey"]);
        assert!(form.list("missing").is_empty());
    }

    #[test]
    fn blank_text_is_absent() {
        let form = form(&[("website", "  "), ("city", " Kampala ")]);

        assert_eq!(form.optional("website"), None);
        assert_eq!(form.text("city"), "Kampala");
        assert_eq!(form.text("country"), "");
    }

    #[test]
    fn files_are_taken_once() {
        let mut form = FormData::default();
        form.files.push((
            "documents".into(),
            UploadedFile {
                file_name: "profile.pdf".into(),
                mime_type: "application/pdf".into(),
                bytes: b"%PDF".to_vec(),
            },
        ));

        assert_eq!(
            form.take_file("documents").map(|f| f.file_name).as_deref(),
            Some("profile.pdf")
        );
        assert!(form.take_file("documents").is_none());
    }
}
