use crate::error::{Result, VastError};
use log::{debug, info, warn};
use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Timeout for fetching an ad response
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Where a VAST document should be read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Url(url::Url),
}

impl Source {
    /// Classify `file://` URLs and existing paths as files, anything else as a URL
    pub fn classify(url_or_path: &str) -> Result<Self> {
        if let Some(path) = url_or_path.strip_prefix("file://") {
            #[cfg(target_os = "windows")]
            let path = path.trim_start_matches('/');

            let path = PathBuf::from(path);
            let samples = Path::new("samples").join(&path);
            if !path.exists() && samples.exists() {
                return Ok(Source::File(samples));
            }
            return Ok(Source::File(path));
        }

        if Path::new(url_or_path).exists() {
            return Ok(Source::File(PathBuf::from(url_or_path)));
        }

        Ok(Source::Url(url::Url::parse(url_or_path)?))
    }
}

/// Read a VAST document from a URL or file path, blocking the caller
pub fn fetch_vast_content(url_or_path: &str) -> Result<String> {
    match Source::classify(url_or_path)? {
        Source::File(path) => read_file(&path),
        Source::Url(url) => {
            let req_id = request_id();
            info!("[{}] Fetching from URL: {}", req_id, url);
            let start = Instant::now();

            let client = reqwest::blocking::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .map_err(|e| VastError::Other(format!("Failed to build HTTP client: {}", e)))?;
            let response = client.get(url).send().map_err(|e| {
                warn!("[{}] Request failed after {:?}", req_id, start.elapsed());
                VastError::Other(format!("Failed to fetch URL: {}", e))
            })?;
            check_status(response.status())?;

            let body = response
                .text()
                .map_err(|e| VastError::Other(format!("Failed to read response body: {}", e)))?;
            debug!("[{}] Request completed in {:?}", req_id, start.elapsed());
            Ok(body)
        }
    }
}

/// Read a VAST document from a URL or file path
pub async fn fetch_vast_content_async(url_or_path: &str) -> Result<String> {
    match Source::classify(url_or_path)? {
        Source::File(path) => {
            info!("Reading from file: {}", path.display());
            Ok(tokio::fs::read_to_string(path).await?)
        }
        Source::Url(url) => fetch_vast_from_url(url).await,
    }
}

async fn fetch_vast_from_url(url: url::Url) -> Result<String> {
    let req_id = request_id();
    info!("[{}] Fetching from URL: {}", req_id, url);
    let start = Instant::now();

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| VastError::Other(format!("Failed to build HTTP client: {}", e)))?;

    let response = client.get(url).send().await.map_err(|e| {
        warn!("[{}] Request failed after {:?}", req_id, start.elapsed());
        VastError::Other(format!("Failed to fetch URL: {}", e))
    })?;
    debug!("[{}] Received response in {:?}", req_id, start.elapsed());
    check_status(response.status())?;

    let body = response
        .text()
        .await
        .map_err(|e| VastError::Other(format!("Failed to read response body: {}", e)))?;
    debug!("[{}] Request completed in {:?}", req_id, start.elapsed());
    Ok(body)
}

fn read_file(path: &Path) -> Result<String> {
    info!("Reading from file: {}", path.display());
    Ok(std::fs::read_to_string(path)?)
}

fn check_status(status: reqwest::StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(VastError::Other(format!(
            "Failed to fetch URL: HTTP status {}",
            status
        )))
    }
}

/// Short random id correlating the log lines of one request
fn request_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_urls_and_paths() {
        let manifest = env!("CARGO_MANIFEST_DIR");
        let cargo = format!("{}/Cargo.toml", manifest);

        assert_eq!(
            Source::classify(&cargo).unwrap(),
            Source::File(PathBuf::from(&cargo))
        );
        assert_eq!(
            Source::classify(&format!("file://{}", cargo)).unwrap(),
            Source::File(PathBuf::from(&cargo))
        );
        assert!(matches!(
            Source::classify("https://ads.example/vast.xml").unwrap(),
            Source::Url(_)
        ));
        assert!(matches!(
            Source::classify("not a url"),
            Err(VastError::UrlError(_))
        ));
    }

    #[test]
    fn reads_local_files() {
        let path = format!("{}/tests/fixtures/pod.xml", env!("CARGO_MANIFEST_DIR"));
        let xml = fetch_vast_content(&path).unwrap();
        assert!(xml.contains("<VAST"));
    }

    #[test]
    fn request_ids_are_short_and_alphanumeric() {
        let id = request_id();
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
