//! Chronological view of the changes within a lineage

use crate::{
    classification::Classification,
    institution::{DegreeStatus, InstitutionRecord, YearData},
    lineage::LineageChain,
    UnitId, Year,
};
use std::{cmp::Reverse, collections::BinaryHeap, slice, sync::Arc};

/// Fields of the yearly data which changed in a [`TimelineEvent`]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct FieldChanges {
    pub name: bool,
    pub classification: bool,
    pub degree_status: bool,
}
//
impl FieldChanges {
    /// Every field changed, as happens on an institution's first observation
    pub const ALL: Self = Self {
        name: true,
        classification: true,
        degree_status: true,
    };

    /// Fields that differ between two observations
    fn between(before: &YearData, after: &YearData) -> Self {
        Self {
            name: before.name != after.name,
            classification: before.classification != after.classification,
            degree_status: before.degree_status != after.degree_status,
        }
    }

    /// Truth that at least one field changed
    pub fn any(&self) -> bool {
        self.name || self.classification || self.degree_status
    }
}

/// Year where something changed about one institution
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TimelineEvent<'chain> {
    /// Year of the change
    pub year: Year,

    /// Institution that changed
    pub unit_id: UnitId,

    /// Name from this year on
    pub name: &'chain str,

    /// Classification from this year on
    pub classification: Option<Classification>,

    /// Degree-granting status from this year on
    pub degree_status: Option<DegreeStatus>,

    /// Which of the above fields changed
    pub changes: FieldChanges,
}
//
impl TimelineEvent<'_> {
    /// Describe what changed, e.g. "named Alpha University, classified
    /// Master's: Master's Colleges & Universities"
    pub fn describe_changes(&self) -> String {
        let mut changes = Vec::new();
        if self.changes.name {
            changes.push(format!("named {}", self.name));
        }
        if self.changes.classification {
            changes.push(match self.classification {
                Some(classification) => format!(
                    "classified {}: {}",
                    classification.group(),
                    classification.label()
                ),
                None => "unclassified".to_owned(),
            });
        }
        if self.changes.degree_status {
            changes.push(match self.degree_status {
                Some(status) => status.to_string(),
                None => "unknown degree status".to_owned(),
            });
        }
        changes.join(", ")
    }
}

/// Changes of a set of institutions, ordered by year then identifier
///
/// Events are computed lazily from the institution records, and iteration can
/// be restarted at will.
#[derive(Clone, Copy, Debug)]
pub struct Timeline<'chain> {
    records: &'chain [Arc<InstitutionRecord>],
}
//
impl<'chain> Timeline<'chain> {
    /// Timeline of some institutions
    pub fn new(records: &'chain [Arc<InstitutionRecord>]) -> Self {
        Self { records }
    }

    /// Iterate over the events, from the start
    pub fn events(&self) -> TimelineEvents<'chain> {
        let mut streams = Vec::with_capacity(self.records.len());
        let mut pending = Vec::with_capacity(self.records.len());
        let mut heap = BinaryHeap::with_capacity(self.records.len());
        for record in self.records {
            let mut stream = InstitutionEvents::new(record);
            let event = stream.next();
            if let Some(event) = &event {
                heap.push(Reverse((event.year, event.unit_id, streams.len())));
            }
            pending.push(event);
            streams.push(stream);
        }
        TimelineEvents {
            streams,
            pending,
            heap,
        }
    }
}
//
impl<'chain> IntoIterator for &Timeline<'chain> {
    type Item = TimelineEvent<'chain>;
    type IntoIter = TimelineEvents<'chain>;

    fn into_iter(self) -> Self::IntoIter {
        self.events()
    }
}
//
impl LineageChain {
    /// Timeline of every institution in this lineage
    pub fn timeline(&self) -> Timeline<'_> {
        Timeline::new(self.records())
    }
}

/// Iterator over the events of a [`Timeline`]
///
/// This is a k-way merge of the per-institution event streams.
#[derive(Clone, Debug)]
pub struct TimelineEvents<'chain> {
    /// Event stream of each institution
    streams: Vec<InstitutionEvents<'chain>>,

    /// Next event of each stream, if any
    pending: Vec<Option<TimelineEvent<'chain>>>,

    /// (year, identifier, stream) of the pending events, earliest first
    heap: BinaryHeap<Reverse<(Year, UnitId, usize)>>,
}
//
impl<'chain> Iterator for TimelineEvents<'chain> {
    type Item = TimelineEvent<'chain>;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((_, _, stream)) = self.heap.pop()?;
        let event = self.pending[stream]
            .take()
            .expect("streams in the heap have a pending event");
        if let Some(next) = self.streams[stream].next() {
            self.heap.push(Reverse((next.year, next.unit_id, stream)));
            self.pending[stream] = Some(next);
        }
        Some(event)
    }
}

/// Changes of one institution
#[derive(Clone, Debug)]
struct InstitutionEvents<'chain> {
    unit_id: UnitId,
    years: slice::Iter<'chain, YearData>,
    last: Option<&'chain YearData>,
}
//
impl<'chain> InstitutionEvents<'chain> {
    fn new(record: &'chain InstitutionRecord) -> Self {
        Self {
            unit_id: record.unit_id,
            years: record.years.iter(),
            last: None,
        }
    }
}
//
impl<'chain> Iterator for InstitutionEvents<'chain> {
    type Item = TimelineEvent<'chain>;

    fn next(&mut self) -> Option<Self::Item> {
        for data in self.years.by_ref() {
            let changes = match self.last {
                Some(last) => FieldChanges::between(last, data),
                None => FieldChanges::ALL,
            };
            self.last = Some(data);
            if changes.any() {
                return Some(TimelineEvent {
                    year: data.year,
                    unit_id: self.unit_id,
                    name: &data.name,
                    classification: data.classification,
                    degree_status: data.degree_status,
                    changes,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::Classification::*;

    fn record(
        unit_id: UnitId,
        years: &[(Year, &str, Classification, DegreeStatus)],
    ) -> Arc<InstitutionRecord> {
        Arc::new(InstitutionRecord {
            unit_id,
            current_name: years.last().map_or("", |year| year.1).into(),
            years: (years.iter())
                .map(|&(year, name, classification, status)| YearData {
                    year,
                    name: name.into(),
                    classification: Some(classification),
                    degree_status: Some(status),
                })
                .collect(),
            links: Box::new([]),
        })
    }

    fn records() -> Vec<Arc<InstitutionRecord>> {
        use DegreeStatus::*;
        vec![
            record(
                2,
                &[
                    (2005, "Beta University", DoctoralR2, Granting),
                    (2006, "Beta University", DoctoralR2, Granting),
                    (2007, "Beta University", DoctoralR1, Granting),
                ],
            ),
            record(
                1,
                &[
                    (1973, "Alpha College", Baccalaureate, Granting),
                    (1974, "Alpha College", Baccalaureate, Granting),
                    (1990, "Alpha University", Masters, Granting),
                    (2004, "Alpha University", Masters, NonGranting),
                    (2005, "Alpha University", Masters, NonGranting),
                ],
            ),
        ]
    }

    #[test]
    fn merged_and_deduplicated() {
        let records = records();
        let timeline = Timeline::new(&records);
        let events = timeline.events().collect::<Vec<_>>();
        assert_eq!(
            events
                .iter()
                .map(|event| (event.year, event.unit_id, event.name))
                .collect::<Vec<_>>(),
            vec![
                (1973, 1, "Alpha College"),
                (1990, 1, "Alpha University"),
                (2004, 1, "Alpha University"),
                (2005, 2, "Beta University"),
                (2007, 2, "Beta University"),
            ]
        );
        assert_eq!(events[0].changes, FieldChanges::ALL);
        assert_eq!(
            events[1].changes,
            FieldChanges {
                name: true,
                classification: true,
                degree_status: false,
            }
        );
        assert_eq!(
            events[2].changes,
            FieldChanges {
                degree_status: true,
                ..FieldChanges::default()
            }
        );
        assert_eq!(events[4].classification, Some(DoctoralR1));
        assert_eq!(
            events[1].describe_changes(),
            "named Alpha University, classified Master's: Master's Colleges & Universities"
        );
        assert_eq!(events[2].describe_changes(), DegreeStatus::NonGranting.to_string());
    }

    #[test]
    fn consecutive_events_differ() {
        let records = records();
        let timeline = Timeline::new(&records);
        for unit_id in [1, 2] {
            let events = (&timeline)
                .into_iter()
                .filter(|event| event.unit_id == unit_id)
                .collect::<Vec<_>>();
            for pair in events.windows(2) {
                assert_ne!(
                    (pair[0].name, pair[0].classification, pair[0].degree_status),
                    (pair[1].name, pair[1].classification, pair[1].degree_status)
                );
                assert!(pair[0].year < pair[1].year);
            }
        }
    }

    #[test]
    fn restartable_and_ordered() {
        let records = records();
        let timeline = Timeline::new(&records);
        let first = timeline.events().collect::<Vec<_>>();
        let second = timeline.events().collect::<Vec<_>>();
        assert_eq!(first, second);
        for pair in first.windows(2) {
            assert!((pair[0].year, pair[0].unit_id) <= (pair[1].year, pair[1].unit_id));
        }
        assert_eq!(Timeline::new(&[]).events().count(), 0);
    }
}
