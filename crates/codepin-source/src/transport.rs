use std::io::{Read, Write};
use std::time::Duration;

use codepin_core::{CodepinError, IoResultExt, Result};
use tracing::debug;

const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Blocking HTTP seam used by version lookup and archive downloads.
pub trait HttpTransport {
    fn get_text(&self, url: &str) -> Result<String>;

    /// Streams the response body of `url` into `out`, reporting
    /// `(bytes_written, content_length)` after every chunk.
    fn download(
        &self,
        url: &str,
        out: &mut dyn Write,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("codepin/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| CodepinError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response> {
        debug!(url, "GET");
        self.client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| network_error(url, err))
    }
}

impl HttpTransport for ReqwestTransport {
    fn get_text(&self, url: &str) -> Result<String> {
        self.send(url)?.text().map_err(|err| network_error(url, err))
    }

    fn download(
        &self,
        url: &str,
        out: &mut dyn Write,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64> {
        let mut response = self.send(url)?;
        let total = response.content_length();
        let mut buffer = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let read = response.read(&mut buffer).map_err(|err| CodepinError::Network {
                url: url.to_string(),
                message: err.to_string(),
            })?;
            if read == 0 {
                break;
            }
            out.write_all(&buffer[..read])
                .io_context(|| "failed to write downloaded bytes")?;
            written += read as u64;
            progress(written, total);
        }
        Ok(written)
    }
}

fn network_error(url: &str, err: reqwest::Error) -> CodepinError {
    CodepinError::Network {
        url: url.to_string(),
        message: err.to_string(),
    }
}
