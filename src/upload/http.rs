//! HTTP `PUT` uploader.

use super::{UploadError, UploadHeaders, Uploader};
use std::io::Read;
use std::time::Duration;
use ureq::{Agent, AgentBuilder};

/// Overall time allowed for one upload.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Uploads frames with `PUT`, one request per frame.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    agent: Agent,
}

impl Default for HttpUploader {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_UPLOAD_TIMEOUT)
    }
}

impl HttpUploader {
    /// Creates an uploader with [`DEFAULT_UPLOAD_TIMEOUT`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an uploader with a custom overall timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            agent: AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Uploader for HttpUploader {
    fn upload(
        &self,
        body: &mut dyn Read,
        length: usize,
        headers: &UploadHeaders<'_>,
        endpoint: &str,
    ) -> Result<(), UploadError> {
        // An explicit length keeps ureq from switching to chunked encoding.
        let result = self
            .agent
            .put(endpoint)
            .set("Content-Type", headers.content_type)
            .set("Content-Length", &length.to_string())
            .set("Fingerprint", headers.fingerprint)
            .set("Token", headers.token)
            .send(Read::take(body, length as u64));

        match result {
            Ok(response) if (200..300).contains(&response.status()) => {
                tracing::debug!(
                    endpoint = %endpoint,
                    status = response.status(),
                    bytes = length,
                    "Uploaded frame"
                );
                Ok(())
            }
            Ok(response) => Err(UploadError::Status {
                status: response.status(),
                endpoint: endpoint.to_string(),
            }),
            Err(ureq::Error::Status(status, _)) => Err(UploadError::Status {
                status,
                endpoint: endpoint.to_string(),
            }),
            Err(e @ ureq::Error::Transport(_)) => Err(UploadError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use tiny_http::{Response, Server};

    struct Received {
        method: String,
        url: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl Received {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(field, _)| field.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }
    }

    /// Serves a single request with `status` and hands back what arrived.
    fn serve_once(status: u16) -> (String, thread::JoinHandle<Received>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();

        let handle = thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut body = Vec::new();
            request.as_reader().read_to_end(&mut body).unwrap();
            let received = Received {
                method: request.method().to_string(),
                url: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.as_str().to_string(), h.value.to_string()))
                    .collect(),
                body,
            };
            request.respond(Response::empty(status)).unwrap();
            received
        });

        (format!("http://127.0.0.1:{port}/c/snapshot"), handle)
    }

    fn can_bind() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    const HEADERS: UploadHeaders<'static> = UploadHeaders {
        content_type: "image/jpg",
        fingerprint: "fp",
        token: "secret",
    };

    #[test]
    fn test_put_carries_headers_and_body() {
        if !can_bind() {
            eprintln!("skipping test: cannot bind local port");
            return;
        }
        let (url, server) = serve_once(200);
        let frame = b"\xFF\xD8jpeg bytes\xFF\xD9";

        HttpUploader::new()
            .upload(&mut &frame[..], frame.len(), &HEADERS, &url)
            .unwrap();

        let received = server.join().unwrap();
        assert_eq!(received.method, "PUT");
        assert_eq!(received.url, "/c/snapshot");
        assert_eq!(received.header("Content-Type"), Some("image/jpg"));
        assert_eq!(received.header("Fingerprint"), Some("fp"));
        assert_eq!(received.header("Token"), Some("secret"));
        assert_eq!(
            received.header("Content-Length"),
            Some(frame.len().to_string().as_str())
        );
        assert_eq!(received.body, frame);
    }

    #[test]
    fn test_only_length_bytes_are_sent() {
        if !can_bind() {
            eprintln!("skipping test: cannot bind local port");
            return;
        }
        let (url, server) = serve_once(204);
        let buffer = [9u8; 32];

        HttpUploader::new()
            .upload(&mut &buffer[..], 10, &HEADERS, &url)
            .unwrap();

        assert_eq!(server.join().unwrap().body, vec![9u8; 10]);
    }

    #[test]
    fn test_error_status_is_reported() {
        if !can_bind() {
            eprintln!("skipping test: cannot bind local port");
            return;
        }
        let (url, server) = serve_once(500);

        let err = HttpUploader::new()
            .upload(&mut &b"x"[..], 1, &HEADERS, &url)
            .unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, UploadError::Status { status: 500, .. }));
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let err = HttpUploader::with_timeout(Duration::from_secs(2))
            .upload(&mut &b"x"[..], 1, &HEADERS, "http://127.0.0.1:1/snap")
            .unwrap_err();

        assert!(matches!(err, UploadError::Transport(_)));
    }
}
