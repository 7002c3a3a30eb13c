use std::time::Duration;

use log::{debug, trace};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use thiserror::Error;

/// Tag input name the gallery plugin expects alongside every download request.
pub(crate) const DEFAULT_TAG_INPUT_NAME: &str = "bwg_tag_id_bwg_thumbnails_masonry_0";

/// Host serving the gallery archives.
pub(crate) const DEFAULT_BASE_URL: &str = "https://film-grab.com";

/// Errors raised while fetching an archive over the network.
#[derive(Error, Debug)]
pub(crate) enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server answered {status} for {url}")]
    Status { status: StatusCode, url: String },
}

/// Anything able to turn a source url into raw archive bytes.
///
/// Shared read-only across every download worker, hence `Sync`.
pub(crate) trait ArchiveFetcher: Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// The remote `admin-ajax.php` endpoint that zips up a whole gallery on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GalleryEndpoint {
    base_url: String,
    tag_input_name: String,
}

impl GalleryEndpoint {
    pub(crate) fn new(base_url: &str, tag_input_name: &str) -> Self {
        GalleryEndpoint {
            base_url: base_url.trim_end_matches('/').to_string(),
            tag_input_name: tag_input_name.to_string(),
        }
    }

    /// Builds the download url for a single gallery.
    pub(crate) fn gallery_url(&self, gallery_id: u64) -> String {
        let tag = &self.tag_input_name;
        format!(
            "{}/wp-admin/admin-ajax.php?action=download_gallery&gallery_id={gallery_id}&bwg=0\
             &type=gallery&tag_input_name={tag}&{tag}&tag=0&bwg_search_0",
            self.base_url
        )
    }
}

impl Default for GalleryEndpoint {
    fn default() -> Self {
        GalleryEndpoint::new(DEFAULT_BASE_URL, DEFAULT_TAG_INPUT_NAME)
    }
}

/// Pulls the `gallery_id` query parameter back out of a download url.
///
/// Returns `None` when the url does not parse, the parameter is absent, or it is not an integer.
pub(crate) fn gallery_id_from_url(url: &str) -> Option<u64> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "gallery_id")
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Timeouts and identity used when building the blocking HTTP client.
#[derive(Debug, Clone)]
pub(crate) struct SenderConfig {
    /// Deadline for a whole request, body included.
    pub(crate) request_timeout: Duration,
    /// Deadline for establishing the connection.
    pub(crate) connect_timeout: Duration,
    pub(crate) user_agent: String,
}

impl Default for SenderConfig {
    fn default() -> Self {
        SenderConfig {
            request_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            user_agent: format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

/// Blocking HTTP fetcher backed by a single pooled `reqwest` client.
#[derive(Debug, Clone)]
pub(crate) struct RequestSender {
    client: Client,
}

impl RequestSender {
    /// Builds the sender and its underlying client.
    pub(crate) fn new(config: &SenderConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .use_rustls_tls()
            .build()?;

        Ok(RequestSender { client })
    }
}

impl ArchiveFetcher for RequestSender {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        trace!("GET {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let bytes = response.bytes()?;
        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves exactly one canned HTTP response on a loopback port.
    fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    fn quick_sender() -> RequestSender {
        let config = SenderConfig {
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            ..SenderConfig::default()
        };
        RequestSender::new(&config).expect("client builds")
    }

    #[test]
    fn test_gallery_url_round_trips_id() {
        let endpoint = GalleryEndpoint::default();
        let url = endpoint.gallery_url(4521);
        assert!(url.starts_with("https://film-grab.com/wp-admin/admin-ajax.php?action=download_gallery"));
        assert!(url.contains("&tag_input_name=bwg_tag_id_bwg_thumbnails_masonry_0&"));
        assert!(url.ends_with("&tag=0&bwg_search_0"));
        assert_eq!(gallery_id_from_url(&url), Some(4521));
    }

    #[test]
    fn test_base_url_trailing_slash_is_dropped() {
        let endpoint = GalleryEndpoint::new("http://localhost:8080/", "tag");
        assert!(endpoint.gallery_url(1).starts_with("http://localhost:8080/wp-admin/"));
    }

    #[test]
    fn test_gallery_id_missing_or_garbage() {
        assert_eq!(gallery_id_from_url("https://film-grab.com/test-gallery"), None);
        assert_eq!(
            gallery_id_from_url("https://film-grab.com/?gallery_id=abc&bwg=0"),
            None
        );
        assert_eq!(gallery_id_from_url("not a url"), None);
    }

    #[test]
    fn test_fetch_returns_body() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 7\r\nConnection: close\r\n\r\nPK\x03\x04abc",
        );
        let bytes = quick_sender().fetch(&format!("{base}/archive")).expect("200 response");
        assert_eq!(bytes, b"PK\x03\x04abc");
    }

    #[test]
    fn test_fetch_rejects_non_success_status() {
        let base = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        match quick_sender().fetch(&format!("{base}/missing")) {
            Err(FetchError::Status { status, .. }) => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[test]
    fn test_fetch_connection_refused() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .expect("free port");
        // listener dropped, nothing accepts on this port anymore
        let result = quick_sender().fetch(&format!("http://{addr}/"));
        assert!(matches!(result, Err(FetchError::Request(_))));
    }
}
