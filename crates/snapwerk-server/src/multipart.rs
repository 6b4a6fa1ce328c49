// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `multipart/form-data` body parsing on top of `multer`.
//
// The request body is already buffered by the HTTP layer, so `multer` reads
// it through an in-memory cursor. Parts are returned in body order.

use std::io::Cursor;

use multer::Multipart;
use snapwerk_core::error::{Result, SnapwerkError};
use tracing::trace;

/// One part of a form body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    /// Form field name.
    pub name: Option<String>,
    /// Client-side filename; present for file uploads.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl FormPart {
    /// File parts are the ones that carry a filename.
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }
}

/// Extract the boundary from a `multipart/form-data` Content-Type value.
pub fn boundary_from_content_type(content_type: &str) -> Result<String> {
    multer::parse_boundary(content_type)
        .ok()
        .filter(|boundary| !boundary.is_empty())
        .ok_or_else(|| {
            SnapwerkError::InvalidRequest(format!(
                "expected multipart/form-data with a boundary, got {content_type:?}"
            ))
        })
}

/// Split `body` into its parts.
pub async fn parse_multipart(body: Vec<u8>, boundary: &str) -> Result<Vec<FormPart>> {
    let mut multipart = Multipart::with_reader(Cursor::new(body), boundary);
    let mut parts = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.to_string());
        let data = field.bytes().await.map_err(malformed)?.to_vec();
        trace!(?name, ?filename, bytes = data.len(), "form part read");

        parts.push(FormPart {
            name,
            filename,
            content_type,
            data,
        });
    }
    Ok(parts)
}

fn malformed(err: multer::Error) -> SnapwerkError {
    SnapwerkError::InvalidRequest(format!("malformed multipart body: {err}"))
}

/// Build a form body from `(name, filename, data)` triples.
#[cfg(test)]
pub(crate) fn encode_form(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
