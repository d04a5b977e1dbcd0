//! Shared helpers for the data crate's behavioural tests.

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::TcpListener,
    sync::mpsc::{self, Receiver},
    thread::{self, JoinHandle},
};

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::Connection;
use tempfile::TempDir;

/// Temporary directory exposed as a UTF-8 path.
pub fn temp_root() -> (TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap_or_else(|err| panic!("failed to create temp dir: {err}"));
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir {path:?} is not UTF-8"));
    (temp, root)
}

/// One-shot HTTP server answering a single request.
pub struct OneShotServer {
    /// Interpreter URL to post queries to.
    pub url: String,
    /// Receives the request body once the request has been read.
    pub requests: Receiver<String>,
    /// Server thread; joins after the response has been written.
    pub handle: JoinHandle<()>,
}

/// Serve `body` with `status` to the first connection on a loopback port.
pub fn serve_once(status: u16, body: Vec<u8>) -> OneShotServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .unwrap_or_else(|err| panic!("failed to bind loopback listener: {err}"));
    let address = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("failed to read listener address: {err}"));
    let (sender, requests) = mpsc::channel();
    let handle = thread::spawn(move || {
        let (stream, _) = listener
            .accept()
            .unwrap_or_else(|err| panic!("failed to accept connection: {err}"));
        let mut reader = BufReader::new(
            stream
                .try_clone()
                .unwrap_or_else(|err| panic!("failed to clone stream: {err}")),
        );
        let mut content_length = 0_usize;
        loop {
            let mut line = String::new();
            reader
                .read_line(&mut line)
                .unwrap_or_else(|err| panic!("failed to read request line: {err}"));
            let header = line.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut request_body = vec![0_u8; content_length];
        reader
            .read_exact(&mut request_body)
            .unwrap_or_else(|err| panic!("failed to read request body: {err}"));
        let _ = sender.send(String::from_utf8_lossy(&request_body).into_owned());

        let mut writer = stream;
        let head = format!(
            "HTTP/1.1 {status} Stub\r\nContent-Type: application/osm3s+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        writer
            .write_all(head.as_bytes())
            .and_then(|()| writer.write_all(&body))
            .and_then(|()| writer.flush())
            .unwrap_or_else(|err| panic!("failed to write response: {err}"));
    });
    OneShotServer {
        url: format!("http://{address}/api/interpreter"),
        requests,
        handle,
    }
}

/// Create a minimal geo-package with `points` and `lines` feature tables.
///
/// Only the metadata the thematic planner reads is present; no spatial
/// extension is required.
pub fn seed_geopackage(path: &Utf8Path) {
    let connection = Connection::open(path.as_std_path())
        .unwrap_or_else(|err| panic!("failed to create geo-package {path}: {err}"));
    connection
        .execute_batch(
            "CREATE TABLE gpkg_geometry_columns (
                table_name TEXT NOT NULL, column_name TEXT NOT NULL,
                geometry_type_name TEXT NOT NULL, srs_id INTEGER NOT NULL,
                z TINYINT NOT NULL, m TINYINT NOT NULL);
             INSERT INTO gpkg_geometry_columns VALUES ('points', 'geom', 'POINT', 4326, 0, 0);
             INSERT INTO gpkg_geometry_columns VALUES ('lines', 'geom', 'LINESTRING', 4326, 0, 0);
             CREATE TABLE points (fid INTEGER PRIMARY KEY, geom BLOB, osm_id TEXT, other_tags TEXT);
             CREATE TABLE lines (fid INTEGER PRIMARY KEY, geom BLOB, osm_id TEXT, highway TEXT, other_tags TEXT);",
        )
        .unwrap_or_else(|err| panic!("failed to seed geo-package {path}: {err}"));
}
