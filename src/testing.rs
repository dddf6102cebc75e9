//! Test utilities: in-memory dataset and fixture builder

use crate::{
    archive::Archive,
    classification::Classification,
    config::Config,
    institution::{self, DegreeStatus},
    partition::{
        builder, index::INDEX_FILE, source::ByteStream, PartitionId, PartitionIndex,
        PartitionSource, RecordBuilder,
    },
    prepare, tsv, Result, UnitId, Year,
};
use anyhow::Context;
use async_compression::tokio::write::GzipEncoder;
use futures::{future::BoxFuture, FutureExt};
use std::{
    collections::{HashMap, HashSet},
    io::Cursor,
    num::NonZeroUsize,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::io::AsyncWriteExt;

/// Gzip-compress some bytes
pub async fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzipEncoder::new(Vec::new());
    encoder.write_all(bytes).await.unwrap();
    encoder.shutdown().await.unwrap();
    encoder.into_inner()
}

/// Dataset files held in memory, with fetch accounting and fault injection
#[derive(Debug, Default)]
pub struct MemorySource {
    /// File contents
    files: Mutex<HashMap<Box<str>, Arc<[u8]>>>,

    /// Files whose fetch should fail
    failing: Mutex<HashSet<Box<str>>>,

    /// Simulated network latency
    delay: Mutex<Option<Duration>>,

    /// Number of times each file was opened
    opens: Mutex<HashMap<Box<str>, usize>>,
}
//
impl MemorySource {
    /// Add or replace a file
    pub fn insert(&self, file: &str, bytes: impl Into<Arc<[u8]>>) {
        self.files.lock().unwrap().insert(file.into(), bytes.into());
    }

    /// Make fetches of a file fail or succeed
    pub fn set_failing(&self, file: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(file.into());
        } else {
            set.remove(file);
        }
    }

    /// Delay every subsequent file opening
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of times a file was opened
    pub fn open_count(&self, file: &str) -> usize {
        self.opens.lock().unwrap().get(file).copied().unwrap_or(0)
    }

    /// Number of file openings, index excluded
    pub fn total_opens(&self) -> usize {
        (self.opens.lock().unwrap().iter())
            .filter(|&(file, _)| &**file != INDEX_FILE)
            .map(|(_, count)| count)
            .sum()
    }
}
//
impl PartitionSource for MemorySource {
    fn open<'a>(&'a self, file: &'a str) -> BoxFuture<'a, Result<ByteStream>> {
        async move {
            *self.opens.lock().unwrap().entry(file.into()).or_default() += 1;
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let failing = self.failing.lock().unwrap().contains(file);
            anyhow::ensure!(!failing, "simulated network failure while fetching {file}");
            let bytes = (self.files.lock().unwrap().get(file).cloned())
                .with_context(|| format!("no file named {file}"))?;
            Ok(Box::pin(Cursor::new(bytes)) as ByteStream)
        }
        .boxed()
    }
}

/// Builder of small partitioned datasets
#[derive(Debug)]
pub struct Fixture {
    /// Institutions added so far
    builder: RecordBuilder,

    /// Number of institutions per partition
    partition_size: NonZeroUsize,
}
//
impl Fixture {
    /// Start a dataset with some number of institutions per partition
    pub fn new(partition_size: usize) -> Self {
        Self {
            builder: RecordBuilder::new(),
            partition_size: NonZeroUsize::new(partition_size).unwrap(),
        }
    }

    /// Add an institution, observed every year of a set of inclusive
    /// `(first year, last year, name, classification)` spans, with some
    /// outbound links in partition file syntax
    pub fn institution(
        mut self,
        unit_id: UnitId,
        spans: &[(Year, Year, &str, Classification)],
        links: &str,
    ) -> Self {
        let current_name = spans.last().map_or("", |span| span.2);
        let links = institution::parse_links(links).unwrap().into_boxed_slice();
        for (idx, &(first, last, name, classification)) in spans.iter().enumerate() {
            for year in first..=last {
                self.builder.add_row(tsv::Row {
                    unit_id,
                    year,
                    name: name.into(),
                    current_name: current_name.into(),
                    classification: Some(classification),
                    degree_status: Some(DegreeStatus::Granting),
                    links: if idx == 0 && year == first {
                        links.clone()
                    } else {
                        Box::new([])
                    },
                });
            }
        }
        self
    }

    /// Partition the dataset, encode it, and expose it as a memory source
    pub async fn build(mut self) -> (Arc<MemorySource>, PartitionIndex) {
        self.builder.mirror_links();
        let (index, partitions) =
            prepare::partition(self.builder.finish(), self.partition_size).unwrap();
        let source = Arc::new(MemorySource::default());
        for (idx, records) in partitions.iter().enumerate() {
            let id = PartitionId::try_from(idx).unwrap();
            let bytes = tsv::encode_rows(Vec::new(), records.iter().flat_map(builder::rows))
                .await
                .unwrap();
            source.insert(&index.partition(id).unwrap().file, bytes);
        }
        source.insert(INDEX_FILE, index.to_json().unwrap());
        (source, index)
    }

    /// Build the dataset and open it as an archive
    pub async fn archive(self, max_candidates: usize) -> (Archive, Arc<MemorySource>) {
        let partition_size = self.partition_size;
        let (source, _index) = self.build().await;
        let config = Arc::new(Config {
            max_candidates: NonZeroUsize::new(max_candidates).unwrap(),
            partition_size,
            ..Config::default()
        });
        let archive = Archive::open(config, source.clone()).await.unwrap();
        (archive, source)
    }
}
