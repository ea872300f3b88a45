//! Blocking HTTP downloads with retry handling.

use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;
use zargo_util::errors::ZargoError;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// A failed download, with the URL and cause folded into the message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DownloadError {
    pub message: String,
}

/// Build a shared blocking client for artifact downloads.
pub fn build_client(timeout: Duration) -> miette::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent("zargo/0.2")
        .build()
        .map_err(|e| {
            ZargoError::Network {
                message: format!("Failed to create HTTP client: {e}"),
            }
            .into()
        })
}

/// Download raw bytes from a URL, retrying transient failures.
///
/// Returns `Ok(None)` for 404 (not present at this location), `Ok(bytes)` on
/// success, or an error after exhausting retries.
pub fn download_bytes(client: &Client, url: &str) -> Result<Option<Vec<u8>>, DownloadError> {
    let mut last_err = String::new();

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            std::thread::sleep(RETRY_DELAY * attempt);
        }

        match client.get(url).send() {
            Ok(resp) => {
                let status = resp.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if status.is_server_error() {
                    last_err = format!("HTTP {status} from {url}");
                    continue;
                }
                if !status.is_success() {
                    return Err(DownloadError {
                        message: format!("HTTP {status} fetching {url}"),
                    });
                }

                let bytes = resp.bytes().map_err(|e| DownloadError {
                    message: format!("Failed to read response from {url}: {e}"),
                })?;
                return Ok(Some(bytes.to_vec()));
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                last_err = format!("{e}");
                continue;
            }
            Err(e) => {
                return Err(DownloadError {
                    message: format!("Request to {url} failed: {e}"),
                });
            }
        }
    }

    Err(DownloadError {
        message: format!("Failed after {MAX_RETRIES} retries for {url}: {last_err}"),
    })
}
