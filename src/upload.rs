use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::UploadError;

/// Acknowledgement returned by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadAck {
    pub ok: bool,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct UploadClient {
    client: Client,
    url: String,
}

impl UploadClient {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST the file as a single `file` multipart field.
    pub async fn upload(&self, path: &Path) -> Result<UploadAck, UploadError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = display_name(path);
        debug!(file = %file_name, size = bytes.len(), url = %self.url, "Uploading file");

        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        let response = self.client.post(&self.url).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await?;

        // The backend answers rejections with a non-2xx status and the same
        // JSON shape, so try the body before giving up on the status.
        match serde_json::from_str::<UploadAck>(&body) {
            Ok(ack) => {
                info!(ok = ack.ok, status = status.as_u16(), "Upload acknowledged");
                Ok(ack)
            }
            Err(_) if !status.is_success() => Err(UploadError::Status {
                status: status.as_u16(),
            }),
            Err(e) => Err(UploadError::Body(e)),
        }
    }
}

/// File name shown in the UI and sent in the form.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve a single canned HTTP response and hand back the raw request.
    pub async fn serve_once(status_line: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        (url, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let headers = text[..header_end].to_ascii_lowercase();
            let body_len = buf.len() - (header_end + 4);

            if let Some(len) = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
            {
                if body_len >= len {
                    break;
                }
            } else if headers.contains("transfer-encoding: chunked") {
                if text.ends_with("0\r\n\r\n") {
                    break;
                }
            } else {
                break;
            }
        }

        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::serve_once;
    use super::*;
    use std::io::Write;

    fn scratch_file(name: &str, contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_file_field() {
        let (_dir, path) = scratch_file("a.py", "print('hi')\n");
        let (url, server) = serve_once("200 OK", r#"{"ok":true,"filename":"a.py"}"#).await;

        let ack = UploadClient::new(&url).upload(&path).await.unwrap();
        assert_eq!(
            ack,
            UploadAck {
                ok: true,
                filename: Some("a.py".to_string()),
                error: None
            }
        );

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /upload"));
        assert!(request.to_ascii_lowercase().contains("multipart/form-data"));
        assert!(request.contains(r#"name="file""#));
        assert!(request.contains(r#"filename="a.py""#));
        assert!(request.contains("print('hi')"));
    }

    #[tokio::test]
    async fn test_rejection_body_is_read_despite_error_status() {
        let (_dir, path) = scratch_file("big.bin", "0000");
        let (url, _server) =
            serve_once("413 Payload Too Large", r#"{"ok":false,"error":"too large"}"#).await;

        let ack = UploadClient::new(&url).upload(&path).await.unwrap();
        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("too large"));
    }

    #[tokio::test]
    async fn test_non_json_error_status_is_reported() {
        let (_dir, path) = scratch_file("a.py", "x = 1");
        let (url, _server) = serve_once("500 Internal Server Error", "<html>boom</html>").await;

        let err = UploadClient::new(&url).upload(&path).await.unwrap_err();
        assert!(matches!(err, UploadError::Status { status: 500 }));
    }

    #[tokio::test]
    async fn test_missing_file_is_a_read_error() {
        let client = UploadClient::new("http://127.0.0.1:9/upload");
        let err = client
            .upload(Path::new("/definitely/not/here.py"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Read { .. }));
    }

    #[test]
    fn test_display_name_uses_file_name() {
        assert_eq!(display_name(Path::new("/tmp/work/main.rs")), "main.rs");
    }
}
