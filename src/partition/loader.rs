//! On-demand, coalescing partition loader

use super::{
    builder::RecordBuilder, source::PartitionSource, Partition, PartitionFetchError, PartitionId,
    PartitionIndex,
};
use crate::tsv;
use futures::{
    future::{self, BoxFuture, Shared},
    FutureExt, StreamExt,
};
use std::{
    collections::{hash_map, HashMap},
    fmt,
    pin::pin,
    sync::{Arc, Mutex, MutexGuard},
};

/// Outcome of a partition fetch, shared by everyone who asked for it
type PartitionFetch = Shared<BoxFuture<'static, Result<Arc<Partition>, PartitionFetchError>>>;

/// Partition cache which fetches partitions the first time they are needed
///
/// Fetches are coalesced: however many tasks ask for a partition at the same
/// time, it is only fetched once, and they all get the same outcome. Loaded
/// partitions are kept for as long as the loader lives, whereas failed
/// fetches are forgotten once reported, so that a later request can try
/// again.
pub struct PartitionLoader {
    /// Index of the partitions
    index: Arc<PartitionIndex>,

    /// Where partition files come from
    source: Arc<dyn PartitionSource>,

    /// Loaded and in-flight partitions
    fetches: Mutex<HashMap<PartitionId, PartitionFetch>>,
}
//
impl PartitionLoader {
    /// Set up a loader with an empty cache
    pub fn new(index: Arc<PartitionIndex>, source: Arc<dyn PartitionSource>) -> Self {
        Self {
            index,
            source,
            fetches: Mutex::new(HashMap::new()),
        }
    }

    /// Index of the partitions
    pub fn index(&self) -> &PartitionIndex {
        &self.index
    }

    /// Get a partition, fetching it if no one did so before
    pub async fn load(&self, id: PartitionId) -> Result<Arc<Partition>, PartitionFetchError> {
        let fetch = self.fetch(id)?;
        let result = fetch.clone().await;
        if let Err(e) = &result {
            // Forget this failed attempt, unless someone already replaced it
            let mut fetches = self.lock();
            if let hash_map::Entry::Occupied(o) = fetches.entry(id) {
                if o.get().ptr_eq(&fetch) {
                    log::warn!("Dropping failed fetch of partition {id} ({e})");
                    o.remove();
                }
            }
        }
        result
    }

    /// Get several partitions concurrently
    ///
    /// Outcomes are reported in the order where partitions were requested.
    pub async fn load_all(
        &self,
        ids: impl IntoIterator<Item = PartitionId>,
    ) -> Vec<(PartitionId, Result<Arc<Partition>, PartitionFetchError>)> {
        future::join_all(
            ids.into_iter()
                .map(|id| async move { (id, self.load(id).await) }),
        )
        .await
    }

    /// Truth that a partition has been successfully loaded
    pub fn is_loaded(&self, id: PartitionId) -> bool {
        self.lock()
            .get(&id)
            .and_then(Shared::peek)
            .is_some_and(Result::is_ok)
    }

    /// Find or start the fetch of a partition
    fn fetch(&self, id: PartitionId) -> Result<PartitionFetch, PartitionFetchError> {
        let info = self
            .index
            .partition(id)
            .ok_or(PartitionFetchError::UnknownPartition(id))?;
        let mut fetches = self.lock();
        let fetch = match fetches.entry(id) {
            hash_map::Entry::Occupied(o) => o.get().clone(),
            hash_map::Entry::Vacant(v) => {
                log::debug!("Fetching partition {id} from {}", info.file);
                let fetch = fetch_partition(self.source.clone(), id, info.file.clone())
                    .boxed()
                    .shared();
                v.insert(fetch).clone()
            }
        };
        Ok(fetch)
    }

    /// Access the fetch map
    fn lock(&self) -> MutexGuard<'_, HashMap<PartitionId, PartitionFetch>> {
        self.fetches
            .lock()
            .expect("no code path should panic while holding the fetch map")
    }
}
//
impl fmt::Debug for PartitionLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut partitions = self.lock().keys().copied().collect::<Vec<_>>();
        partitions.sort_unstable();
        f.debug_struct("PartitionLoader")
            .field("source", &self.source)
            .field("partitions", &partitions)
            .finish_non_exhaustive()
    }
}

/// Download and decode one partition file
async fn fetch_partition(
    source: Arc<dyn PartitionSource>,
    id: PartitionId,
    file: Box<str>,
) -> Result<Arc<Partition>, PartitionFetchError> {
    let bytes = source
        .open(&file)
        .await
        .map_err(|e| PartitionFetchError::Fetch {
            partition: id,
            cause: format!("{e:#}").into(),
        })?;
    let mut rows = pin!(tsv::decode_rows(bytes, tsv::is_gzipped(&file)));
    let mut builder = RecordBuilder::new();
    while let Some(row) = rows.next().await {
        builder.add_row(row.map_err(|e| PartitionFetchError::from_csv(id, e))?);
    }
    let partition = Partition::new(id, builder.finish());
    log::debug!(
        "Loaded partition {id} with {} institutions",
        partition.len()
    );
    Ok(Arc::new(partition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classification::Classification,
        testing::{gzip, Fixture},
    };
    use std::time::Duration;

    fn fixture() -> Fixture {
        Fixture::new(1)
            .institution(1, &[(1973, 1989, "Alpha College", Classification::Baccalaureate)], "")
            .institution(2, &[(1990, 2010, "Beta University", Classification::Masters)], "")
    }

    #[tokio::test]
    async fn concurrent_loads_are_coalesced() {
        let (source, index) = fixture().build().await;
        source.set_delay(Duration::from_millis(20));
        let loader = PartitionLoader::new(Arc::new(index), source.clone());

        let (first, second) = tokio::join!(loader.load(0), loader.load(0));
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.open_count("part-00.tsv.gz"), 1);
        assert!(loader.is_loaded(0));
        assert!(!loader.is_loaded(1));

        // Warm cache
        let third = loader.load(0).await.unwrap();
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(source.open_count("part-00.tsv.gz"), 1);
        assert_eq!(&*third.records()[0].current_name, "Alpha College");
    }

    #[tokio::test]
    async fn failures_are_shared_then_forgotten() {
        let (source, index) = fixture().build().await;
        source.set_delay(Duration::from_millis(20));
        source.set_failing("part-01.tsv.gz", true);
        let loader = PartitionLoader::new(Arc::new(index), source.clone());

        let outcomes = loader.load_all([1, 1, 0]).await;
        assert_eq!(
            outcomes.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![1, 1, 0]
        );
        for (_, outcome) in &outcomes[..2] {
            assert!(matches!(
                outcome,
                Err(PartitionFetchError::Fetch { partition: 1, .. })
            ));
        }
        assert!(outcomes[2].1.is_ok());
        assert_eq!(source.open_count("part-01.tsv.gz"), 1);
        assert!(!loader.is_loaded(1));

        // A later request tries again
        source.set_failing("part-01.tsv.gz", false);
        let beta = loader.load(1).await.unwrap();
        assert!(beta.get(2).is_some());
        assert_eq!(source.open_count("part-01.tsv.gz"), 2);
    }

    #[tokio::test]
    async fn unknown_partitions_are_not_fetched() {
        let (source, index) = fixture().build().await;
        let loader = PartitionLoader::new(Arc::new(index), source.clone());
        assert_eq!(
            loader.load(7).await.unwrap_err(),
            PartitionFetchError::UnknownPartition(7)
        );
        assert_eq!(source.total_opens(), 0);
    }

    #[tokio::test]
    async fn malformed_links_are_parse_errors() {
        let (source, index) = fixture().build().await;
        source.insert(
            "part-00.tsv.gz",
            gzip(b"1\t1973\tAlpha College\tAlpha College\tB\tY\tmerged-into:2\n").await,
        );
        let loader = PartitionLoader::new(Arc::new(index), source);
        assert!(matches!(
            loader.load(0).await,
            Err(PartitionFetchError::Parse { partition: 0, .. })
        ));
    }

    #[tokio::test]
    async fn corrupt_gzip_is_a_parse_error() {
        let (source, index) = fixture().build().await;
        source.insert("part-00.tsv.gz", &b"Alpha College, but not compressed"[..]);
        let loader = PartitionLoader::new(Arc::new(index), source.clone());
        assert!(matches!(
            loader.load(0).await,
            Err(PartitionFetchError::Parse { partition: 0, .. })
        ));

        // Network failures remain fetch errors
        source.set_failing("part-01.tsv.gz", true);
        assert!(matches!(
            loader.load(1).await,
            Err(PartitionFetchError::Fetch { partition: 1, .. })
        ));
    }
}
