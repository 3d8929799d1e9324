use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;
use url::Url;

/// Downloads build-time artifacts (repository keyring, installer script).
///
/// A trait so tests can serve canned payloads or simulate an unreachable
/// URL without any network access.
pub trait Fetcher {
    /// Download `url` to `dest`, returning the SHA-256 of the payload.
    fn fetch(&self, url: &str, dest: &Path) -> Result<[u8; 32]>;
}

/// Fetches artifacts over HTTP(S).
pub struct HttpFetcher {
    http: Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let user_agent = format!("rigup/{}", env!("CARGO_PKG_VERSION"));
        Ok(Self { http, user_agent })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<[u8; 32]> {
        debug!(url, ?dest, "downloading artifact");

        let mut response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .with_context(|| format!("Failed to download {url}"))?;

        if !response.status().is_success() {
            bail!("Download of {url} returned {}", response.status());
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory for artifact at {:?}", dest)
            })?;
        }

        let temp_path = dest.with_extension("download");
        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temporary file at {:?}", temp_path))?;

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let read = response
                .read(&mut buffer)
                .with_context(|| format!("Failed while reading from {url}"))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .with_context(|| format!("Failed while writing artifact to {:?}", temp_path))?;
            hasher.update(&buffer[..read]);
        }

        file.flush()
            .with_context(|| format!("Failed to flush artifact to {:?}", temp_path))?;

        fs::rename(&temp_path, dest).with_context(|| {
            format!(
                "Failed to move downloaded artifact from {:?} to {:?}",
                temp_path, dest
            )
        })?;

        Ok(hasher.finalize().into())
    }
}

/// Hex-encode a digest for receipts and display.
pub fn format_digest(bytes: &[u8; 32]) -> String {
    hex::encode(bytes)
}

/// File name to store a downloaded artifact under, taken from the last URL
/// path segment.
pub(crate) fn artifact_name(url: &str, fallback: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StubFetcher;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn format_digest_hex_encodes() {
        let digest = [0xabu8; 32];
        let formatted = format_digest(&digest);
        assert_eq!(formatted.len(), 64);
        assert!(formatted.starts_with("abab"));
    }

    /// Artifact names come from the last URL path segment, with a fallback
    /// for bare hosts and unparsable URLs.
    #[rstest]
    #[case(
        "https://repo.example.com/compute/cuda-keyring_1.1-1_all.deb",
        "cuda-keyring_1.1-1_all.deb"
    )]
    #[case("https://repo.example.com/a/b/cuda-ubuntu2204.pin", "cuda-ubuntu2204.pin")]
    #[case("https://pyenv.run", "fallback.sh")]
    #[case("https://pyenv.run/", "fallback.sh")]
    #[case("not a url", "fallback.sh")]
    fn artifact_name_cases(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(artifact_name(url, "fallback.sh"), expected);
    }

    #[test]
    fn stub_fetcher_writes_payload_and_digests() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("artifact.deb");

        let fetcher = StubFetcher::new();
        fetcher.serve("https://repo.example.com/key.deb", b"hello world");

        let digest = fetcher
            .fetch("https://repo.example.com/key.deb", &dest)
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
        assert_eq!(
            format_digest(&digest),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
