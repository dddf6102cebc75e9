//! Partitions of the institution dataset
//!
//! The dataset is sliced into name-sorted partitions of a few thousand
//! institutions, described by a [`PartitionIndex`]. Partitions are fetched from
//! a [`PartitionSource`] on demand and cached by the [`PartitionLoader`].

pub mod builder;
pub mod index;
pub mod loader;
pub mod source;

pub use self::{
    builder::RecordBuilder,
    index::{PartitionIndex, PartitionInfo},
    loader::PartitionLoader,
    source::{DirSource, HttpSource, PartitionSource},
};

use crate::{institution::InstitutionRecord, UnitId};
use std::{collections::HashMap, io, sync::Arc};

/// Partition identifier, i.e. position of the partition within the index
pub type PartitionId = u16;

/// Immutable chunk of the institution dataset
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Partition {
    /// Identifier of this partition
    id: PartitionId,

    /// Institution records, sorted by caseless current name
    records: Box<[Arc<InstitutionRecord>]>,

    /// Position of each institution within `records`
    positions: HashMap<UnitId, usize>,
}
//
impl Partition {
    /// Wrap up records that were decoded from a partition file
    pub fn new(id: PartitionId, records: Vec<InstitutionRecord>) -> Self {
        let records = records.into_iter().map(Arc::new).collect::<Box<[_]>>();
        let positions = (records.iter().enumerate())
            .map(|(pos, record)| (record.unit_id, pos))
            .collect();
        Self {
            id,
            records,
            positions,
        }
    }

    /// Identifier of this partition
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// Records from this partition, sorted by caseless current name
    pub fn records(&self) -> &[Arc<InstitutionRecord>] {
        &self.records[..]
    }

    /// Look up an institution's record
    pub fn get(&self, unit_id: UnitId) -> Option<&Arc<InstitutionRecord>> {
        self.positions.get(&unit_id).map(|&pos| &self.records[pos])
    }

    /// Number of institutions within this partition
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Truth that this partition holds no institution
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Failure to obtain a partition or one of its institutions
///
/// This error is cloneable because every caller that waited on the same
/// coalesced fetch gets its own copy of the outcome.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum PartitionFetchError {
    /// The requested partition does not exist in the index
    #[error("partition {0} is not listed in the partition index")]
    UnknownPartition(PartitionId),

    /// The requested institution does not appear in the index
    #[error("institution {0} is not listed in the partition index")]
    UnknownInstitution(UnitId),

    /// The index points to a partition which does not hold the institution
    #[error("institution {unit_id} is missing from partition {partition}")]
    MissingInstitution {
        partition: PartitionId,
        unit_id: UnitId,
    },

    /// The partition file could not be obtained
    #[error("failed to fetch partition {partition}: {cause}")]
    Fetch {
        partition: PartitionId,
        cause: Arc<str>,
    },

    /// The partition file could not be decoded
    #[error("failed to parse partition {partition}: {cause}")]
    Parse {
        partition: PartitionId,
        cause: Arc<str>,
    },
}
//
impl PartitionFetchError {
    /// Partition which this error is about, if any
    pub fn partition(&self) -> Option<PartitionId> {
        match self {
            Self::UnknownPartition(partition)
            | Self::MissingInstitution { partition, .. }
            | Self::Fetch { partition, .. }
            | Self::Parse { partition, .. } => Some(*partition),
            Self::UnknownInstitution(_) => None,
        }
    }

    /// Classify an error from the TSV decoder
    ///
    /// I/O errors happen while the file is still being downloaded, so they are
    /// reported as fetch failures, unless they come from the gzip decoder
    /// rejecting the data. Everything else is a parse failure.
    pub(crate) fn from_csv(partition: PartitionId, error: csv_async::Error) -> Self {
        let cause = error.to_string().into();
        let undecodable = match error.kind() {
            csv_async::ErrorKind::Io(io) => matches!(
                io.kind(),
                io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
            ),
            _ => true,
        };
        if undecodable {
            Self::Parse { partition, cause }
        } else {
            Self::Fetch { partition, cause }
        }
    }
}
