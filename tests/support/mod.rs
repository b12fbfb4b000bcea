//! Shared fixtures for integration tests: tiny images, host responses and
//! archive inspection.

#![allow(dead_code)]

use std::io::{Cursor, Read};

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DOC_ID: &str = "doc1";
pub const TOKEN: &str = "s3cr3t-token";

/// Encodes a `width` x `height` solid image.
pub fn image_bytes(width: u32, height: u32, format: ImageOutputFormat) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    image_bytes(width, height, ImageOutputFormat::Png)
}

/// Base URL handed out in access grants for the mock document.
pub fn doc_base(server: &MockServer) -> String {
    format!("{}/api/docs/{DOC_ID}", server.uri())
}

/// Mounts `GET /api/docs/doc1/attachments/{id}/download`.
pub async fn mount_attachment(
    server: &MockServer,
    id: u64,
    body: Vec<u8>,
    content_type: &str,
    file_name: Option<&str>,
) {
    let mut response = ResponseTemplate::new(200)
        .set_body_bytes(body)
        .insert_header("content-type", content_type);
    if let Some(name) = file_name {
        response =
            response.insert_header("content-disposition", format!("attachment; filename=\"{name}\""));
    }
    Mock::given(method("GET"))
        .and(path(format!("/api/docs/{DOC_ID}/attachments/{id}/download")))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mounts a failing status for one attachment.
pub async fn mount_attachment_status(server: &MockServer, id: u64, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/api/docs/{DOC_ID}/attachments/{id}/download")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Records endpoint body holding one record.
pub fn records_body(id: i64, fields: Value) -> Value {
    json!({ "records": [{ "id": id, "fields": fields }] })
}

/// Entry names of a ZIP archive, in archive order.
pub fn zip_entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|index| archive.by_index(index).unwrap().name().to_string())
        .collect()
}

/// Content of one ZIP entry.
pub fn zip_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    out
}
