// This file's job is to deal with the update server and network side of the
// updater: fetching the release manifest and streaming file bodies. All
// requests carry a finite timeout; a hung server is reported like any other
// network error.

use std::fmt::{Display, Formatter};
use std::io::Read;
use std::time::Duration;

use anyhow::bail;

/// Finite network timeout for the manifest fetch and for each file request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed cause carried inside the `anyhow` errors the hooks return, so the
/// checker can map failures onto its `CheckError` taxonomy with a downcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkFailure {
    /// Connection refused, DNS failure, timeout: the network is unavailable.
    Unreachable(String),
    /// The server answered with a non-success HTTP status.
    Status(u16),
}

impl std::error::Error for NetworkFailure {}

impl Display for NetworkFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkFailure::Unreachable(msg) => write!(f, "Network unreachable: {msg}"),
            NetworkFailure::Status(code) => write!(f, "Request failed with status: {code}"),
        }
    }
}

pub type ManifestFetchFn = fn(&str) -> anyhow::Result<String>;
pub type DownloadStreamFn = fn(&str) -> anyhow::Result<Box<dyn Read + Send>>;

/// A container for network callbacks which can be mocked out for testing.
#[derive(Clone)]
pub struct NetworkHooks {
    /// Fetches the manifest document body from its well-known URL.
    pub manifest_fetch_fn: ManifestFetchFn,
    /// Opens a streaming reader over one file's response body.
    pub download_stream_fn: DownloadStreamFn,
}

// We have to implement Debug by hand since fn types don't implement it.
impl core::fmt::Debug for NetworkHooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkHooks")
            .field("manifest_fetch_fn", &"<fn>")
            .field("download_stream_fn", &"<fn>")
            .finish()
    }
}

impl Default for NetworkHooks {
    fn default() -> Self {
        Self {
            manifest_fetch_fn: manifest_fetch_default,
            download_stream_fn: download_stream_default,
        }
    }
}

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

pub fn manifest_fetch_default(url: &str) -> anyhow::Result<String> {
    soundloom_debug!("Fetching manifest from: {}", url);
    let result = client()?.get(url).send();
    let response = handle_network_result(result)?;
    Ok(response.text()?)
}

pub fn download_stream_default(url: &str) -> anyhow::Result<Box<dyn Read + Send>> {
    soundloom_debug!("Opening download stream: {}", url);
    let result = client()?.get(url).send();
    let response = handle_network_result(result)?;
    Ok(Box::new(response))
}

/// Handles the result of a network request, returning the response if it was
/// successful and a typed `NetworkFailure` otherwise.
fn handle_network_result(
    result: Result<reqwest::blocking::Response, reqwest::Error>,
) -> anyhow::Result<reqwest::blocking::Response> {
    match result {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                Ok(response)
            } else {
                bail!(NetworkFailure::Status(status.as_u16()))
            }
        }
        Err(e) => bail!(NetworkFailure::Unreachable(e.to_string())),
    }
}

/// Builds the download URL for one file:
/// `{base}/{version}/{variant}/{relative_path}`. Each path segment is
/// URL-escaped, but the directory structure is preserved so remote and local
/// relative paths stay identical.
pub fn file_download_url(
    base_url: &str,
    version: &str,
    variant: &str,
    relative_path: &str,
) -> anyhow::Result<String> {
    let mut url = reqwest::Url::parse(base_url)?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Manifest base URL cannot be a base: {base_url}"))?;
        segments.pop_if_empty();
        segments.push(version);
        segments.push(variant);
        segments.extend(relative_path.split('/'));
    }
    Ok(url.to_string())
}

/// The manifest's base URL is its own URL with the document name dropped.
pub fn manifest_base_url(manifest_url: &str) -> anyhow::Result<String> {
    let mut url = reqwest::Url::parse(manifest_url)?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Manifest URL cannot be a base: {manifest_url}"))?;
        segments.pop_if_empty();
        segments.pop();
    }
    Ok(url.to_string())
}
