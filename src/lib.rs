//! Historical lineage of U.S. higher-education institutions
//!
//! The dataset covers roughly five decades of Carnegie Classification data,
//! with one observation per institution and per year. It is published as a
//! set of name-sorted partitions plus a small index, so that looking up one
//! institution only requires fetching the few partitions that its lineage
//! actually touches.
//!
//! The main entry point is [`Archive`], which exposes the query interface
//! (search, lineage resolution, timeline construction), and [`Session`],
//! which tags results with request tokens so that stale selections are never
//! displayed.

pub mod archive;
pub mod classification;
pub mod config;
pub mod institution;
pub mod lineage;
pub mod partition;
pub mod prepare;
pub mod progress;
pub mod timeline;
pub mod tsv;

#[cfg(test)]
mod testing;

pub use crate::{
    archive::{Archive, Candidate, MatchKind, RequestToken, Resolution, Session, Tagged},
    classification::{Classification, ClassificationGroup},
    config::Config,
    institution::{DegreeStatus, InstitutionRecord, Link, RelationKind, YearData},
    lineage::{
        LineageChain, LineageEdge, LineageNode, LinkConflict, UnresolvedRelationship, YearRange,
    },
    partition::{Partition, PartitionFetchError, PartitionId},
    timeline::{FieldChanges, Timeline, TimelineEvent},
};

/// Use anyhow for Result type erasure
pub use anyhow::Result;

/// Year of Gregorian Calendar
pub type Year = i16;

/// Stable institution identifier (IPEDS unit id)
pub type UnitId = u32;

/// Leading `chars` characters of a string, or the whole string if shorter
pub(crate) fn char_prefix(s: &str, chars: usize) -> &str {
    match s.char_indices().nth(chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
