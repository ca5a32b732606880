//! Fixtures shared by the unit tests.

use std::io::{Cursor, Write};

use axum::Router;
use reqwest::Client;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::networking::NetworkClient;

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("test listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{addr}")
}

/// HTTP client that ignores any proxy configured in the environment.
pub fn client() -> NetworkClient {
    let client = Client::builder()
        .no_proxy()
        .build()
        .expect("test HTTP client");
    NetworkClient::from_client(client)
}

/// Build a zip archive in memory. Names ending in `/` become directories.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("zip directory");
        } else {
            writer.start_file(*name, options).expect("zip file");
            writer.write_all(contents.as_bytes()).expect("zip contents");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}
