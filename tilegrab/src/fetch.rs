//! Tile fetching with a bounded retry policy.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use futures::TryStreamExt;
use tokio::{fs, io};

pub use reqwest::Client;

use crate::Error;

/// Some tile servers reject requests without a browser-like user agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
const TIMEOUT: Duration = Duration::from_secs(30);

/// A single attempt to fetch `url` and save its content to `path`.
pub trait Fetch: Send + Sync + 'static {
    /// Fetch `url` once and write its body to `path`, creating missing parent directories.
    ///
    /// On failure, `path` may be missing or hold a partial file.
    fn fetch(&self, url: &str, path: &Path) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Terminal state of a tile fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The tile has been saved after `attempts` attempts.
    Saved { attempts: u32 },
    /// Every attempt failed, only the last error is kept.
    Exhausted { attempts: u32, error: Error },
}

impl FetchOutcome {
    #[inline]
    pub fn is_saved(&self) -> bool {
        matches!(self, FetchOutcome::Saved { .. })
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        match self {
            FetchOutcome::Saved { attempts } | FetchOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Fetch `url` into `path`, retrying up to `max_retries` more times on failure.
///
/// It stops on the first success, so `max_retries + 1` attempts are made at most. Retries are immediate, there is no backoff.
/// Failures never propagate: an exhausted fetch is returned as such for the caller to skip the tile.
pub async fn fetch_and_save<F: Fetch>(fetcher: &F, url: &str, path: &Path, max_retries: u32) -> FetchOutcome {
    let mut attempts = 0;

    loop {
        attempts += 1;

        match fetcher.fetch(url, path).await {
            Ok(()) => {
                tracing::trace!("Saved `{url}` to `{}` in {attempts} attempt(s)", path.display());

                return FetchOutcome::Saved { attempts };
            }
            Err(error) if attempts > max_retries => {
                tracing::warn!("Giving up on `{url}` after {attempts} attempt(s): {error}");

                return FetchOutcome::Exhausted { attempts, error };
            }
            Err(error) => {
                tracing::debug!("Attempt {attempts} failed for `{url}`, retrying: {error}");
            }
        }
    }
}

/// HTTP tile fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, Error> {
        let client = Client::builder().user_agent(USER_AGENT).timeout(TIMEOUT).build()?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, path: &Path) -> Result<(), Error> {
        use io::AsyncWriteExt;

        let url = url::Url::parse(url)?;

        let resp = self.client.get(url.clone()).send().await?;

        if resp.status() != reqwest::StatusCode::OK {
            return Err(Error::Status {
                status: resp.status(),
                url: url.into(),
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = fs::File::create(path).await?;
        let mut writer = io::BufWriter::new(file);

        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.try_next().await? {
            writer.write_all(&chunk).await?;
        }

        writer.shutdown().await?;
        writer.into_inner().sync_all().await?;

        Ok(())
    }
}
