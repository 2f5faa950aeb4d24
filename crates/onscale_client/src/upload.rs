use bytes::Bytes;
use onscale_core::constants::files::*;
use onscale_core::prelude::*;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method};
use std::path::Path;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use url::form_urlencoded;

use crate::{Result, check_status, transport_error};

/// Substitutes the upload placeholders of a presigned request template.
pub fn fill_placeholders(template: &str, name: &str, size: u64) -> String {
    let encoded: String = form_urlencoded::byte_serialize(name.as_bytes()).collect();
    template
        .replace(PLACEHOLDER_URL_ENCODED_FILE_NAME, &encoded)
        .replace(PLACEHOLDER_FILE_NAME, name)
        .replace(PLACEHOLDER_FILE_SIZE, &size.to_string())
}

enum Payload {
    Bytes(Bytes),
    File(File),
}

pub(crate) async fn send_bytes(
    client: &Client,
    target: &HttpRequest,
    name: &str,
    data: Bytes,
) -> Result<()> {
    let size = data.len() as u64;
    send(client, target, name, size, Payload::Bytes(data)).await
}

pub(crate) async fn send_file(
    client: &Client,
    target: &HttpRequest,
    name: &str,
    path: &Path,
) -> Result<()> {
    let file = File::open(path).await?;
    let size = file.metadata().await?.len();
    send(client, target, name, size, Payload::File(file)).await
}

async fn send(
    client: &Client,
    target: &HttpRequest,
    name: &str,
    size: u64,
    payload: Payload,
) -> Result<()> {
    let uri = fill_placeholders(&target.uri, name, size);
    // Presigned storage uploads are POST unless the platform explicitly asks for PUT.
    let method = if target.method.eq_ignore_ascii_case("PUT") {
        Method::PUT
    } else {
        Method::POST
    };

    let mut builder = client.request(method, &uri);
    for (k, v) in &target.headers {
        builder = builder.header(k.as_str(), fill_placeholders(v, name, size));
    }

    let body = match payload {
        Payload::Bytes(data) => Body::from(data),
        Payload::File(file) => Body::wrap_stream(ReaderStream::new(file)),
    };

    builder = if target.form_fields.is_empty() {
        builder
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(body)
    } else {
        let mut form = Form::new();
        for (k, v) in &target.form_fields {
            form = form.text(k.clone(), fill_placeholders(v, name, size));
        }
        // Storage services expect the file as the last part.
        let part = Part::stream_with_length(body, size).file_name(name.to_string());
        builder.multipart(form.part("file", part))
    };

    let response = builder.send().await.map_err(transport_error)?;
    check_status(response).await?;
    Ok(())
}
