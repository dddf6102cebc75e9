//! Places where partition files can be fetched from

use crate::{
    progress::{ProgressConfig, ProgressReport, Work},
    Result,
};
use anyhow::Context;
use futures::{future::BoxFuture, FutureExt, StreamExt};
use reqwest::Response;
use std::{
    fmt::Debug,
    io::{self, ErrorKind},
    path::Path,
    pin::Pin,
};
use tokio::{fs::File, io::AsyncBufRead, io::BufReader};
use tokio_util::io::StreamReader;

/// Byte stream from a file of the dataset
pub type ByteStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// Location of the dataset files (index and partitions)
pub trait PartitionSource: Debug + Send + Sync {
    /// Start reading a file, given its name relative to the dataset location
    fn open<'a>(&'a self, file: &'a str) -> BoxFuture<'a, Result<ByteStream>>;
}

/// Read a whole (small) file from a source
pub async fn read_to_end(source: &dyn PartitionSource, file: &str) -> Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;
    let mut bytes = Vec::new();
    source
        .open(file)
        .await?
        .read_to_end(&mut bytes)
        .await
        .with_context(|| format!("reading {file}"))?;
    Ok(bytes)
}

/// Dataset stored in a local directory
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DirSource {
    /// Directory holding the index and partition files
    root: Box<Path>,
}
//
impl DirSource {
    /// Read files from a directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().into(),
        }
    }
}
//
impl PartitionSource for DirSource {
    fn open<'a>(&'a self, file: &'a str) -> BoxFuture<'a, Result<ByteStream>> {
        async move {
            let path = self.root.join(file);
            let file = File::open(&path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            Ok(Box::pin(BufReader::new(file)) as ByteStream)
        }
        .boxed()
    }
}

/// Dataset published on a web server
#[derive(Clone, Debug)]
pub struct HttpSource {
    /// HTTP client
    client: reqwest::Client,

    /// URL of the directory holding the index and partition files
    base_url: Box<str>,

    /// Where download progress should be reported, if anywhere
    report: Option<ProgressReport>,
}
//
impl HttpSource {
    /// Download files from a base URL
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').into(),
            report: None,
        }
    }

    /// Report download progress
    pub fn with_progress(self, report: ProgressReport) -> Self {
        Self {
            report: Some(report),
            ..self
        }
    }

    /// URL of a file from the dataset
    pub fn url(&self, file: &str) -> String {
        format!("{}/{file}", self.base_url)
    }
}
//
impl PartitionSource for HttpSource {
    fn open<'a>(&'a self, file: &'a str) -> BoxFuture<'a, Result<ByteStream>> {
        async move {
            // Start the download
            let url = self.url(file);
            let context = || format!("initiating download of {url}");
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .and_then(Response::error_for_status)
                .with_context(context)?;
            let tracker = self.report.as_ref().map(|report| {
                let work = response
                    .content_length()
                    .map_or(Work::UnknownBytes, Work::Bytes);
                report.add(format!("Fetching {file}"), ProgressConfig::new(work))
            });

            // Slice the download into chunks of bytes
            let bytes = StreamReader::new(response.bytes_stream().map(move |res| {
                res
                    // Track how many bytes have been downloaded so far
                    .inspect(|bytes_block| {
                        if let Some(tracker) = &tracker {
                            tracker.make_progress(bytes_block.len() as u64);
                        }
                    })
                    // Translate reqwest errors into I/O errors
                    .map_err(|e| io::Error::new(ErrorKind::Other, Box::new(e)))
            }));
            Ok(Box::pin(bytes) as ByteStream)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn directory_source() {
        let dir = std::env::temp_dir().join(format!("campus-lineage-source-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("hello.txt"), b"hello").await.unwrap();

        let source = DirSource::new(&dir);
        assert_eq!(read_to_end(&source, "hello.txt").await.unwrap(), b"hello");
        assert!(source.open("missing.txt").await.is_err());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn http_urls() {
        let source = HttpSource::new(reqwest::Client::new(), "https://example.org/carnegie/");
        assert_eq!(source.url("index.json"), "https://example.org/carnegie/index.json");
    }
}
