//! Concurrent asset downloader.
//!
//! All assets of one document are requested at once and awaited together;
//! each finished download is written straight to its planned local path.

use std::path::Path;

use futures::future::join_all;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use tracing::{debug, info, instrument, warn};

use yuque_export_shared::{AUTH_HEADER, AssetKind, AssetReference, ClientConfig, ExportError, Result};

/// User-Agent sent with attachment downloads.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/58.0.3029.110 Safari/537.36";

// ---------------------------------------------------------------------------
// FetchReport
// ---------------------------------------------------------------------------

/// A successfully downloaded asset.
#[derive(Debug, Clone)]
pub struct DownloadedAsset {
    pub asset: AssetReference,
    /// Bytes written to disk.
    pub bytes: usize,
}

/// An asset that could not be downloaded or written.
#[derive(Debug)]
pub struct FailedAsset {
    pub asset: AssetReference,
    pub error: ExportError,
}

/// Outcome of downloading every asset of one document.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub downloaded: Vec<DownloadedAsset>,
    pub failed: Vec<FailedAsset>,
}

impl FetchReport {
    /// Whether every asset made it to disk.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total bytes written.
    pub fn bytes_written(&self) -> usize {
        self.downloaded.iter().map(|d| d.bytes).sum()
    }
}

// ---------------------------------------------------------------------------
// AssetFetcher
// ---------------------------------------------------------------------------

/// Downloads images and attachments to their local paths.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: Client,
    token: String,
}

impl AssetFetcher {
    /// Create a fetcher; the token is only sent with attachment requests.
    ///
    /// `config.timeout` bounds connecting and each read, not the whole
    /// transfer, so large files are not cut off while data keeps flowing.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .build()
            .map_err(|e| ExportError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: config.token.clone(),
        })
    }

    /// Download every asset concurrently and wait for all of them.
    ///
    /// Individual failures never cancel the other downloads; they are
    /// collected in [`FetchReport::failed`] in input order.
    #[instrument(skip_all, fields(assets = assets.len()))]
    pub async fn fetch_all(&self, assets: &[AssetReference]) -> FetchReport {
        let results = join_all(assets.iter().map(|asset| self.fetch_one(asset))).await;

        let mut report = FetchReport::default();
        for (asset, result) in assets.iter().zip(results) {
            match result {
                Ok(bytes) => report.downloaded.push(DownloadedAsset {
                    asset: asset.clone(),
                    bytes,
                }),
                Err(error) => {
                    warn!(url = %asset.remote_url, error = %error, "asset download failed");
                    report.failed.push(FailedAsset {
                        asset: asset.clone(),
                        error,
                    });
                }
            }
        }

        debug!(
            downloaded = report.downloaded.len(),
            failed = report.failed.len(),
            bytes = report.bytes_written(),
            "asset downloads finished"
        );

        report
    }

    /// Download one asset and write it to `local_absolute_path`.
    ///
    /// Returns the number of bytes written.
    pub async fn fetch_one(&self, asset: &AssetReference) -> Result<usize> {
        info!(kind = %asset.kind, path = %asset.local_absolute_path.display(), "downloading asset");

        let mut request = self.client.get(&asset.remote_url);
        if asset.kind == AssetKind::Attachment {
            request = request
                .header(USER_AGENT, BROWSER_USER_AGENT)
                .header(AUTH_HEADER, &self.token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExportError::fetch(&asset.remote_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::fetch(
                &asset.remote_url,
                format!("HTTP {status}"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ExportError::fetch(&asset.remote_url, format!("body read failed: {e}")))?;

        write_asset(&asset.local_absolute_path, &body)?;
        Ok(body.len())
    }
}

/// Write `bytes` to `path`, creating parent directories as needed.
/// Existing files are overwritten.
fn write_asset(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| ExportError::io(path, e))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use uuid::Uuid;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    fn fetcher() -> AssetFetcher {
        fetcher_with_timeout(Duration::from_secs(5))
    }

    fn fetcher_with_timeout(timeout: Duration) -> AssetFetcher {
        let config = ClientConfig {
            base_url: "https://www.yuque.com/api/v2".parse().unwrap(),
            token: "secret-token".into(),
            timeout,
            user_agent: "yuque-export-test".into(),
        };
        AssetFetcher::new(&config).unwrap()
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("yq-fetch-test-{}", Uuid::now_v7()))
    }

    fn asset(kind: AssetKind, url: String, local: PathBuf) -> AssetReference {
        AssetReference {
            kind,
            full_match: String::new(),
            remote_url: url,
            local_relative_path: String::new(),
            local_absolute_path: local,
        }
    }

    #[tokio::test]
    async fn downloads_image_into_new_directory() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/yuque/0/1/pic.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG fake".to_vec()))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let target = dir.join("nested").join("assets").join("Doc-0.png");
        let assets = vec![asset(
            AssetKind::Image,
            format!("{}/yuque/0/1/pic.png", server.uri()),
            target.clone(),
        )];

        let report = fetcher().fetch_all(&assets).await;
        assert!(report.is_complete());
        assert_eq!(report.bytes_written(), 9);
        assert_eq!(std::fs::read(&target).unwrap(), b"\x89PNG fake");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn attachment_requests_carry_identifying_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/attachments/yuque/0/1/a.zip"))
            .and(header("x-auth-token", "secret-token"))
            .and(|req: &Request| {
                req.headers.get("user-agent").and_then(|v| v.to_str().ok())
                    == Some(BROWSER_USER_AGENT)
            })
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = temp_dir();
        let target = dir.join("assets").join("a.zip");
        let assets = vec![asset(
            AssetKind::Attachment,
            format!("{}/api/v2/attachments/yuque/0/1/a.zip", server.uri()),
            target.clone(),
        )];

        let report = fetcher().fetch_all(&assets).await;
        assert!(report.is_complete());
        assert_eq!(std::fs::read(&target).unwrap(), b"PK");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn image_requests_do_not_send_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/yuque/i.png"))
            .and(header("x-auth-token", "secret-token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/yuque/i.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img".to_vec()))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let target = dir.join("i.png");
        let image = asset(AssetKind::Image, format!("{}/yuque/i.png", server.uri()), target);

        let bytes = fetcher().fetch_one(&image).await.unwrap();
        assert_eq!(bytes, 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn failures_are_reported_without_cancelling_others() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/yuque/ok.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/yuque/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let assets = vec![
            asset(
                AssetKind::Image,
                format!("{}/yuque/missing.png", server.uri()),
                dir.join("missing.png"),
            ),
            asset(
                AssetKind::Image,
                format!("{}/yuque/ok.png", server.uri()),
                dir.join("ok.png"),
            ),
        ];

        let report = fetcher().fetch_all(&assets).await;
        assert!(!report.is_complete());
        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].asset.remote_url.ends_with("missing.png"));
        assert!(matches!(report.failed[0].error, ExportError::Fetch { .. }));
        assert!(!report.failed[0].error.is_fatal());
        assert!(dir.join("ok.png").exists());
        assert!(!dir.join("missing.png").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn stalled_server_fails_the_asset_without_hanging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/yuque/slow.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let dir = temp_dir();
        let target = dir.join("slow.png");
        let image = asset(AssetKind::Image, format!("{}/yuque/slow.png", server.uri()), target.clone());

        let err = fetcher_with_timeout(Duration::from_millis(200))
            .fetch_one(&image)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Fetch { .. }));
        assert!(!err.is_fatal());
        assert!(!target.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn redownload_overwrites_existing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/yuque/p.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let target = dir.join("p.png");
        std::fs::write(&target, b"old contents").unwrap();

        let image = asset(AssetKind::Image, format!("{}/yuque/p.png", server.uri()), target.clone());
        fetcher().fetch_one(&image).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
