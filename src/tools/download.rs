use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

const DEFAULT_USER_AGENT: &str = concat!("cxxboot/", env!("CARGO_PKG_VERSION"));

/// Retrieves one artifact to a local file and returns its SHA-256.
pub trait Fetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<[u8; 32]>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(None)
            .build()
            .map_err(|source| Error::Download {
                url: String::new(),
                source,
            })?;
        Ok(Self { http })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<[u8; 32]> {
        let download_error = |source| Error::Download {
            url: url.to_string(),
            source,
        };

        let mut response = self
            .http
            .get(url)
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .send()
            .map_err(download_error)?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io(
                    format!("Failed to create parent directory for download at {:?}", dest),
                    e,
                )
            })?;
        }

        let temp_path = dest.with_extension("download");
        let mut file = File::create(&temp_path).map_err(|e| {
            Error::io(format!("Failed to create temporary file at {:?}", temp_path), e)
        })?;

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];
        let mut total = 0usize;

        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|e| Error::io(format!("Failed while reading download stream from {url}"), e))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .map_err(|e| Error::io(format!("Failed while writing download to {:?}", temp_path), e))?;
            hasher.update(&buffer[..read]);
            total += read;
        }

        file.flush()
            .map_err(|e| Error::io(format!("Failed to flush download to {:?}", temp_path), e))?;

        fs::rename(&temp_path, dest).map_err(|e| {
            Error::io(
                format!("Failed to move download from {:?} to {:?}", temp_path, dest),
                e,
            )
        })?;

        debug!("Downloaded {total} bytes from {url}");
        Ok(hasher.finalize().into())
    }
}

pub fn format_digest(bytes: &[u8; 32]) -> String {
    hex::encode(bytes)
}

/// SHA-256 of bytes already in memory.
pub fn digest_bytes(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}
