//! Static index of the dataset partitions
//!
//! The index is computed once, when the dataset is partitioned, and published
//! next to the partition files as JSON. It is small enough to be loaded
//! upfront, and answers "which partitions should I look at" questions without
//! touching any partition.

use super::PartitionId;
use crate::{char_prefix, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use unicase::UniCase;

/// Name of the index file, next to the partition files
pub const INDEX_FILE: &str = "index.json";

/// What we know about one partition without loading it
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct PartitionInfo {
    /// Partition file name, relative to the dataset location
    pub file: Box<str>,

    /// Caseless-smallest current name within the partition
    pub first_name: Box<str>,

    /// Caseless-largest current name within the partition
    pub last_name: Box<str>,

    /// Number of institutions within the partition
    pub records: usize,
}
//
impl PartitionInfo {
    /// Truth that the partition may contain current names starting with some
    /// (caseless) prefix
    fn may_contain_prefix(&self, prefix: &str) -> bool {
        let len = prefix.chars().count();
        let prefix = UniCase::new(prefix);
        UniCase::new(char_prefix(&self.first_name, len)) <= prefix
            && prefix <= UniCase::new(char_prefix(&self.last_name, len))
    }
}

/// Mapping from names and identifiers to partitions
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PartitionIndex {
    /// Partitions, sorted by caseless name range
    partitions: Box<[PartitionInfo]>,

    /// Partition holding each institution
    institutions: HashMap<UnitId, PartitionId>,
}
//
impl PartitionIndex {
    /// Build an index from its parts
    pub fn new(
        partitions: impl Into<Box<[PartitionInfo]>>,
        institutions: HashMap<UnitId, PartitionId>,
    ) -> Self {
        Self {
            partitions: partitions.into(),
            institutions,
        }
    }

    /// Decode the JSON index
    pub fn from_json(json: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(json)
    }

    /// Encode the index as JSON
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Number of partitions
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Truth that the dataset has no partition
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Number of institutions across all partitions
    pub fn num_institutions(&self) -> usize {
        self.institutions.len()
    }

    /// Information about a partition
    pub fn partition(&self, id: PartitionId) -> Option<&PartitionInfo> {
        self.partitions.get(usize::from(id))
    }

    /// Partition which holds an institution
    pub fn partition_of(&self, unit_id: UnitId) -> Option<PartitionId> {
        self.institutions.get(&unit_id).copied()
    }

    /// Partitions that may hold institutions whose current name starts with
    /// some caseless prefix, by decreasing relevance
    ///
    /// Partitions are sorted by name, so the first partition returned is the
    /// one where the query itself would be inserted, which is where exact
    /// matches live. It is followed by partitions holding longer names that
    /// start with the same prefix. Empty queries match nothing.
    pub fn lookup_name(&self, query: &str) -> Vec<PartitionId> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let candidates = (self.partitions.iter().enumerate())
            .filter(|(_idx, info)| info.may_contain_prefix(query))
            .map(|(idx, _info)| {
                PartitionId::try_from(idx).expect("partition count should fit in a PartitionId")
            })
            .collect::<Vec<_>>();
        log::trace!("Name query {query:?} maps to partitions {candidates:?}");
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(file: &str, first_name: &str, last_name: &str) -> PartitionInfo {
        PartitionInfo {
            file: file.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            records: 2,
        }
    }

    fn index() -> PartitionIndex {
        PartitionIndex::new(
            vec![
                info("part-00.tsv.gz", "Abbey College", "Saint Anselm College"),
                info("part-01.tsv.gz", "Saint Mary's College", "Saint Mary's College"),
                info("part-02.tsv.gz", "Saint Mary's University", "Zion Bible College"),
            ],
            [(1, 0), (2, 0), (3, 1), (4, 1), (5, 2), (6, 2)]
                .into_iter()
                .collect(),
        )
    }

    #[test]
    fn prefix_lookup() {
        let index = index();
        assert_eq!(index.lookup_name("abbey"), vec![0]);
        assert_eq!(index.lookup_name("  ZION "), vec![2]);
        assert_eq!(index.lookup_name("Saint Mary's College"), vec![1]);
        assert_eq!(index.lookup_name("saint mary's"), vec![1, 2]);
        assert_eq!(index.lookup_name("Saint"), vec![0, 1, 2]);
        assert_eq!(index.lookup_name("Saint Mary's U"), vec![2]);
        assert!(index.lookup_name("").is_empty());
        assert!(index.lookup_name("Aardvark").is_empty());
    }

    #[test]
    fn insertion_partition_comes_first() {
        let index = index();
        // Partition 0 ends at "Saint Anselm College", before "Saint M..."
        assert_eq!(index.lookup_name("saint m"), vec![1, 2]);
        // "Saint B" sorts between partitions 0 and 1, neither can hold it
        assert_eq!(index.lookup_name("Saint B"), Vec::<PartitionId>::new());
        assert_eq!(index.lookup_name("S"), vec![0, 1, 2]);
    }

    #[test]
    fn identifier_lookup_and_json() {
        let index = index();
        assert_eq!(index.partition_of(4), Some(1));
        assert_eq!(index.partition_of(42), None);
        assert_eq!(index.partition(2).map(|info| &*info.file), Some("part-02.tsv.gz"));
        assert_eq!(index.partition(3), None);
        assert_eq!(index.num_institutions(), 6);
        let json = index.to_json().unwrap();
        assert_eq!(PartitionIndex::from_json(&json).unwrap(), index);
    }
}
