//! Mechanism for building [`InstitutionRecord`]s from partition file rows

use crate::{
    institution::{InstitutionRecord, Link, YearData},
    tsv::Row,
    UnitId, Year,
};
use rayon::prelude::*;
use std::collections::{hash_map, HashMap};
use unicase::UniCase;

/// Accumulator for rows from one or more partition files
///
/// Rows may come in any order: they are grouped by institution, and yearly data
/// is sorted once all rows have been added.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    /// Data accumulated so far, per institution
    institutions: HashMap<UnitId, InstitutionBuilder>,
}
//
impl RecordBuilder {
    /// Set up the accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate a new row
    pub fn add_row(&mut self, row: Row) {
        match self.institutions.entry(row.unit_id) {
            hash_map::Entry::Occupied(o) => o.into_mut().add_row(row),
            hash_map::Entry::Vacant(v) => {
                v.insert(InstitutionBuilder::from(row));
            }
        }
    }

    /// Number of distinct institutions seen so far
    pub fn len(&self) -> usize {
        self.institutions.len()
    }

    /// Truth that no row has been added yet
    pub fn is_empty(&self) -> bool {
        self.institutions.is_empty()
    }

    /// Copy every direct link into the record of its target, as an inverse link
    ///
    /// This lets lineage resolution walk relationships backwards without
    /// having to look at every partition. Links towards institutions that are
    /// not part of the data are left alone.
    pub fn mirror_links(&mut self) {
        let mut mirrors = Vec::new();
        for (&holder, institution) in &self.institutions {
            for link in institution.links.iter().filter(|link| !link.inverse) {
                if link.target != holder && self.institutions.contains_key(&link.target) {
                    mirrors.push((link.target, link.mirror(holder)));
                }
            }
        }
        log::debug!("Mirroring {} relationship links", mirrors.len());
        for (target, mirror) in mirrors {
            if let Some(institution) = self.institutions.get_mut(&target) {
                institution.links.push(mirror);
            }
        }
    }

    /// Build the final records, sorted by caseless current name then
    /// identifier
    pub fn finish(self) -> Vec<InstitutionRecord> {
        let mut records = (self.institutions.into_iter())
            .map(|(unit_id, institution)| institution.build(unit_id))
            .collect::<Vec<_>>();
        records.par_sort_unstable_by(|a, b| {
            (UniCase::new(&*a.current_name), a.unit_id)
                .cmp(&(UniCase::new(&*b.current_name), b.unit_id))
        });
        records
    }
}

/// Accumulated data about a single institution
#[derive(Debug)]
struct InstitutionBuilder {
    /// Most recent name, along with the year where it was recorded
    current_name: (Year, Box<str>),

    /// Yearly data, in the order where it was added
    years: Vec<YearData>,

    /// Relationship links, possibly duplicated
    links: Vec<Link>,
}
//
impl InstitutionBuilder {
    /// Record a new row about this institution
    fn add_row(&mut self, row: Row) {
        if row.year >= self.current_name.0 {
            self.current_name = (row.year, row.current_name.clone());
        }
        self.links.extend_from_slice(&row.links);
        self.years.push(year_data(row));
    }

    /// Finalize the data once we're sure no more rows are coming
    fn build(mut self, unit_id: UnitId) -> InstitutionRecord {
        // Keep the first observation of each year
        self.years.sort_by_key(|data| data.year);
        self.years.dedup_by_key(|data| data.year);
        self.links.sort_unstable();
        self.links.dedup();
        InstitutionRecord {
            unit_id,
            current_name: self.current_name.1,
            years: self.years.into(),
            links: self.links.into(),
        }
    }
}
//
impl From<Row> for InstitutionBuilder {
    fn from(row: Row) -> Self {
        Self {
            current_name: (row.year, row.current_name.clone()),
            links: row.links.to_vec(),
            years: vec![year_data(row)],
        }
    }
}

/// Extract the yearly data subset of a row
fn year_data(row: Row) -> YearData {
    YearData {
        year: row.year,
        name: row.name,
        classification: row.classification,
        degree_status: row.degree_status,
    }
}

/// Rows that describe a record, in partition file order
///
/// Links are written on the first row.
pub fn rows(record: &InstitutionRecord) -> impl Iterator<Item = Row> + '_ {
    (record.years.iter()).enumerate().map(|(idx, data)| Row {
        unit_id: record.unit_id,
        year: data.year,
        name: data.name.clone(),
        current_name: record.current_name.clone(),
        classification: data.classification,
        degree_status: data.degree_status,
        links: if idx == 0 {
            record.links.clone()
        } else {
            Box::new([])
        },
    })
}
