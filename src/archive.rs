//! Query interface of the institution archive

use crate::{
    char_prefix,
    config::Config,
    institution::InstitutionRecord,
    lineage::{self, LineageChain},
    partition::{
        index::INDEX_FILE, source, PartitionFetchError, PartitionId, PartitionIndex,
        PartitionLoader, PartitionSource,
    },
    Result, UnitId, Year,
};
use anyhow::Context;
use std::{
    collections::HashSet,
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use unicase::UniCase;

/// Read-only access to a partitioned institution dataset
#[derive(Debug)]
pub struct Archive {
    /// Archive configuration
    config: Arc<Config>,

    /// Partition loader and cache
    loader: PartitionLoader,
}
//
impl Archive {
    /// Open a dataset by fetching its partition index
    pub async fn open(config: Arc<Config>, source: Arc<dyn PartitionSource>) -> Result<Self> {
        let json = source::read_to_end(&*source, INDEX_FILE)
            .await
            .context("fetching the partition index")?;
        let index = PartitionIndex::from_json(&json).context("decoding the partition index")?;
        log::info!(
            "Opened dataset of {} institutions across {} partitions",
            index.num_institutions(),
            index.len()
        );
        Ok(Self {
            config,
            loader: PartitionLoader::new(Arc::new(index), source),
        })
    }

    /// Archive configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Partition index
    pub fn index(&self) -> &PartitionIndex {
        self.loader.index()
    }

    /// Partition loader
    pub fn loader(&self) -> &PartitionLoader {
        &self.loader
    }

    /// Find institutions by identifier or by caseless current name prefix
    ///
    /// Identifier matches come first, then exact name matches, then prefix
    /// matches. Within each group, candidates are sorted by caseless name then
    /// identifier. At most `max_candidates` candidates are returned.
    pub async fn search(&self, query: &str) -> Result<Vec<Candidate>, PartitionFetchError> {
        let query = query.trim();
        let mut candidates = Vec::new();

        // Numeric queries may be institution identifiers
        if let Ok(unit_id) = query.parse::<UnitId>() {
            if let Some(partition) = self.index().partition_of(unit_id) {
                if let Some(record) = self.loader.load(partition).await?.get(unit_id) {
                    candidates.push(Candidate::new(record, partition, MatchKind::Identifier));
                }
            }
        }

        // Name search, restricted to the partitions that may match
        let query_len = query.chars().count();
        let caseless_query = UniCase::new(query);
        let partitions = self.index().lookup_name(query);
        for (partition, outcome) in self.loader.load_all(partitions).await {
            for record in outcome?.records() {
                let name = &*record.current_name;
                let kind = if UniCase::new(name) == caseless_query {
                    MatchKind::Exact
                } else if UniCase::new(char_prefix(name, query_len)) == caseless_query {
                    MatchKind::Prefix
                } else {
                    continue;
                };
                candidates.push(Candidate::new(record, partition, kind));
            }
        }

        // Rank and deduplicate candidates
        candidates.sort_by(|a, b| {
            (a.kind, UniCase::new(&*a.current_name), a.unit_id).cmp(&(
                b.kind,
                UniCase::new(&*b.current_name),
                b.unit_id,
            ))
        });
        let mut seen = HashSet::new();
        candidates.retain(|candidate| seen.insert(candidate.unit_id));
        candidates.truncate(self.config.max_candidates.get());
        log::debug!("Query {query:?} matched {} candidates", candidates.len());
        Ok(candidates)
    }

    /// Find the one institution designated by a query, if there is one
    ///
    /// Only the best kind of match is considered: if a name matches exactly,
    /// institutions whose name merely starts with it are not ambiguous
    /// alternatives.
    pub async fn resolve_name(&self, query: &str) -> Result<Resolution, PartitionFetchError> {
        let mut candidates = self.search(query).await?;
        let Some(best) = candidates.first().map(|candidate| candidate.kind) else {
            return Ok(Resolution::NotFound);
        };
        candidates.retain(|candidate| candidate.kind == best);
        Ok(if candidates.len() == 1 {
            Resolution::Unique(candidates.remove(0))
        } else {
            Resolution::Ambiguous(candidates.into())
        })
    }

    /// Lineage of an institution
    pub async fn lineage(&self, unit_id: UnitId) -> Result<LineageChain, PartitionFetchError> {
        lineage::resolve(&self.loader, unit_id).await
    }
}

/// How a search candidate matched the query
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MatchKind {
    /// The query is the institution's identifier
    Identifier,

    /// The query is the institution's current name, up to case
    Exact,

    /// The institution's current name starts with the query, up to case
    Prefix,
}

/// Institution matching a search query
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Candidate {
    /// Institution identifier
    pub unit_id: UnitId,

    /// Most recent name
    pub current_name: Box<str>,

    /// Partition holding the institution
    pub partition: PartitionId,

    /// First year of observation
    pub first_year: Option<Year>,

    /// Last year of observation
    pub last_year: Option<Year>,

    /// How the institution matched
    pub kind: MatchKind,
}
//
impl Candidate {
    fn new(record: &InstitutionRecord, partition: PartitionId, kind: MatchKind) -> Self {
        Self {
            unit_id: record.unit_id,
            current_name: record.current_name.clone(),
            partition,
            first_year: record.first_year(),
            last_year: record.last_year(),
            kind,
        }
    }
}
//
impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.current_name, self.unit_id)?;
        if let (Some(first), Some(last)) = (self.first_year, self.last_year) {
            write!(f, " {first}-{last}")?;
        }
        Ok(())
    }
}

/// Outcome of looking up one institution by name
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// No institution matches
    NotFound,

    /// Exactly one institution matches
    Unique(Candidate),

    /// Several distinct institutions match equally well, and the user must
    /// pick one
    Ambiguous(Box<[Candidate]>),
}

/// Identifier of a user request within a [`Session`]
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RequestToken(u64);

/// Result of a request, tagged with the request's token
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tagged<T> {
    /// Request that produced this value
    pub token: RequestToken,

    /// Request result
    pub value: T,
}

/// Interactive use of an archive
///
/// Every request takes a new token, and only the result of the latest request
/// is accepted. Results of requests which were superseded while they were in
/// flight are discarded, although partitions which they loaded stay cached.
#[derive(Debug)]
pub struct Session {
    /// Archive being queried
    archive: Arc<Archive>,

    /// Latest token that was handed out
    latest: AtomicU64,
}
//
impl Session {
    /// Start a session
    pub fn new(archive: Arc<Archive>) -> Self {
        Self {
            archive,
            latest: AtomicU64::new(0),
        }
    }

    /// Archive being queried
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Start a new request, superseding all previous ones
    pub fn begin(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Truth that a request has not been superseded
    pub fn is_latest(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::Relaxed) == token.0
    }

    /// Search institutions as a new request
    ///
    /// The request token is taken when this function is called, not when the
    /// output future is first polled.
    pub fn search<'a>(
        &'a self,
        query: &'a str,
    ) -> impl Future<Output = Tagged<Result<Vec<Candidate>, PartitionFetchError>>> + 'a {
        let token = self.begin();
        async move {
            Tagged {
                token,
                value: self.archive.search(query).await,
            }
        }
    }

    /// Resolve a lineage as a new request
    ///
    /// The request token is taken when this function is called, not when the
    /// output future is first polled.
    pub fn lineage(
        &self,
        unit_id: UnitId,
    ) -> impl Future<Output = Tagged<Result<LineageChain, PartitionFetchError>>> + '_ {
        let token = self.begin();
        async move {
            Tagged {
                token,
                value: self.archive.lineage(unit_id).await,
            }
        }
    }

    /// Unwrap a request result, unless the request was superseded
    pub fn accept<T>(&self, tagged: Tagged<T>) -> Option<T> {
        let Tagged { token, value } = tagged;
        if self.is_latest(token) {
            Some(value)
        } else {
            log::debug!("Discarding result of superseded request {token:?}");
            None
        }
    }
}
