//! Archive configuration

use crate::{
    partition::{DirSource, HttpSource, PartitionSource},
    progress::ProgressReport,
};
use std::{num::NonZeroUsize, sync::Arc};

/// Default location of the dataset: the current directory
pub const DEFAULT_SOURCE: &str = ".";

/// Default maximal number of search results
pub const DEFAULT_MAX_CANDIDATES: usize = 50;

/// Default number of institutions per partition
pub const DEFAULT_PARTITION_SIZE: usize = 6000;

/// Final process configuration
///
/// The command-line front-end builds this from its arguments, library users
/// build it directly. Once built, it is shared as an immutable `Arc<Config>`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Config {
    /// Location of the dataset: local directory, or `http(s)://` base URL
    pub source: Box<str>,

    /// Maximal number of candidates returned by a search
    pub max_candidates: NonZeroUsize,

    /// Number of institutions per partition, when partitioning a dataset
    pub partition_size: NonZeroUsize,
}
//
impl Config {
    /// Configuration for a dataset location, other settings being defaulted
    pub fn new(source: impl Into<Box<str>>) -> Arc<Self> {
        Arc::new(Self {
            source: source.into(),
            ..Self::default()
        })
    }

    /// Truth that the dataset is published on a web server
    pub fn is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }

    /// Set up access to the dataset files
    ///
    /// Downloads from remote datasets are reported as progress bars.
    pub fn partition_source(&self, report: &ProgressReport) -> Arc<dyn PartitionSource> {
        if self.is_remote() {
            log::debug!("Reading dataset from web server {}", self.source);
            Arc::new(HttpSource::new(reqwest::Client::new(), &self.source).with_progress(report.clone()))
        } else {
            log::debug!("Reading dataset from local directory {}", self.source);
            Arc::new(DirSource::new(&*self.source))
        }
    }
}
//
impl Default for Config {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.into(),
            max_candidates: NonZeroUsize::new(DEFAULT_MAX_CANDIDATES)
                .expect("default candidate count is not zero"),
            partition_size: NonZeroUsize::new(DEFAULT_PARTITION_SIZE)
                .expect("default partition size is not zero"),
        }
    }
}
