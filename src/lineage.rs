//! Lineage resolution
//!
//! Starting from one institution, relationship links are followed in both
//! directions, across as many partitions as needed, until every institution
//! that is directly or indirectly related to it has been found. The result is
//! a [`LineageChain`], where each institution is split into the periods during
//! which it kept the same name.

use crate::{
    institution::{InstitutionRecord, RelationKind},
    partition::{PartitionFetchError, PartitionId, PartitionLoader},
    UnitId, Year,
};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    sync::Arc,
};

/// Inclusive range of years
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct YearRange {
    /// First year
    pub start: Year,

    /// Last year
    pub end: Year,
}
//
impl YearRange {
    /// Truth that a year belongs to this range
    pub fn contains(&self, year: Year) -> bool {
        (self.start..=self.end).contains(&year)
    }
}
//
impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Relationship from a name period to a later institution or name
///
/// Edges always point forward in time, from the predecessor to the
/// successor, whichever side stated the relationship.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LineageEdge {
    /// Kind of relationship
    pub kind: RelationKind,

    /// Successor institution
    pub target: UnitId,

    /// Name of the successor when the relationship took effect, if its
    /// record could be loaded
    pub target_name: Option<Box<str>>,

    /// Year on which the relationship took effect
    pub year: Year,
}
//
impl LineageEdge {
    /// Truth that the successor's record was loaded
    pub fn is_resolved(&self) -> bool {
        self.target_name.is_some()
    }
}

/// Period during which an institution kept the same name
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LineageNode {
    /// Institution identifier
    pub unit_id: UnitId,

    /// Name during this period
    pub name: Box<str>,

    /// Years during which this name was in use
    pub years: YearRange,

    /// Outgoing relationships, by increasing year
    pub edges: Vec<LineageEdge>,
}
//
impl LineageNode {
    /// Truth that nothing follows this period in the lineage
    pub fn is_terminal(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Relationship that could not be followed because the record on the other
/// side could not be loaded
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UnresolvedRelationship {
    /// Institution whose record holds the link
    pub from: UnitId,

    /// Kind of relationship
    pub kind: RelationKind,

    /// Institution that could not be loaded
    pub target: UnitId,

    /// Year of the relationship
    pub year: Year,

    /// Partition that should have held the target, if known
    pub partition: Option<PartitionId>,

    /// What went wrong
    pub cause: Arc<str>,
}
//
impl fmt::Display for UnresolvedRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not follow {} link from {} to {} ({})",
            self.kind, self.from, self.target, self.year
        )?;
        if let Some(partition) = self.partition {
            write!(f, " in partition {partition}")?;
        }
        write!(f, ": {}", self.cause)
    }
}

/// Relationship whose year is stated differently by different records
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct LinkConflict {
    /// Predecessor institution
    pub predecessor: UnitId,

    /// Successor institution
    pub successor: UnitId,

    /// Kind of the statement that was retained
    pub kind: RelationKind,

    /// Year that was retained
    pub chosen: Year,

    /// Every year that was stated, in increasing order
    pub years: Box<[Year]>,
}
//
impl fmt::Display for LinkConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} is dated {:?}, using {} ({})",
            self.predecessor, self.successor, self.years, self.chosen, self.kind
        )
    }
}

/// Chronological lineage of an institution
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineageChain {
    /// Institution that the lineage was requested for
    root: UnitId,

    /// Name periods, sorted by start year then identifier
    nodes: Box<[LineageNode]>,

    /// Records of every institution that could be loaded, sorted by identifier
    records: Box<[Arc<InstitutionRecord>]>,

    /// Relationships that could not be followed
    warnings: Box<[UnresolvedRelationship]>,

    /// Relationships with disagreeing years
    conflicts: Box<[LinkConflict]>,
}
//
impl LineageChain {
    /// Institution that the lineage was requested for
    pub fn root(&self) -> UnitId {
        self.root
    }

    /// Name periods, sorted by start year then identifier
    pub fn nodes(&self) -> &[LineageNode] {
        &self.nodes[..]
    }

    /// Records of the institutions of this lineage, sorted by identifier
    pub fn records(&self) -> &[Arc<InstitutionRecord>] {
        &self.records[..]
    }

    /// Record of one institution of this lineage
    pub fn record(&self, unit_id: UnitId) -> Option<&InstitutionRecord> {
        self.records
            .binary_search_by_key(&unit_id, |record| record.unit_id)
            .ok()
            .map(|pos| &*self.records[pos])
    }

    /// Relationships that could not be followed
    pub fn warnings(&self) -> &[UnresolvedRelationship] {
        &self.warnings[..]
    }

    /// Relationships whose year was stated inconsistently
    pub fn conflicts(&self) -> &[LinkConflict] {
        &self.conflicts[..]
    }

    /// Truth that some related institutions could not be loaded
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Institutions of this lineage other than the root, with their current
    /// name
    pub fn related(&self) -> impl Iterator<Item = (UnitId, &str)> + '_ {
        (self.records.iter())
            .filter(|record| record.unit_id != self.root)
            .map(|record| (record.unit_id, &*record.current_name))
    }
}

/// Statement of a relationship, as found in one record
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Statement {
    kind: RelationKind,
    year: Year,
    /// Stated by the relationship's own subject, not mirrored
    direct: bool,
}

/// Relationship after tie-breaking
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Relationship {
    predecessor: UnitId,
    successor: UnitId,
    kind: RelationKind,
    year: Year,
}

/// Build the lineage of an institution
///
/// Only fails if the root institution itself cannot be loaded. Failures to
/// load other institutions produce a partial chain, with one warning per
/// relationship that could not be followed.
pub async fn resolve(
    loader: &PartitionLoader,
    root: UnitId,
) -> Result<LineageChain, PartitionFetchError> {
    let index = loader.index();
    let root_partition = index
        .partition_of(root)
        .ok_or(PartitionFetchError::UnknownInstitution(root))?;
    let root_record = loader
        .load(root_partition)
        .await?
        .get(root)
        .cloned()
        .ok_or(PartitionFetchError::MissingInstitution {
            partition: root_partition,
            unit_id: root,
        })?;

    // Explore the relationship graph one level at a time
    let mut records = BTreeMap::from([(root, root_record)]);
    let mut visited = HashSet::from([root]);
    let mut failed = HashMap::<UnitId, PartitionFetchError>::new();
    let mut frontier = vec![root];
    let mut level = 0;
    while !frontier.is_empty() {
        let mut discovered = BTreeMap::<PartitionId, Vec<UnitId>>::new();
        for unit_id in frontier.drain(..) {
            for link in records[&unit_id].links.iter() {
                if !visited.insert(link.target) {
                    continue;
                }
                match index.partition_of(link.target) {
                    Some(partition) => discovered.entry(partition).or_default().push(link.target),
                    None => {
                        failed.insert(
                            link.target,
                            PartitionFetchError::UnknownInstitution(link.target),
                        );
                    }
                }
            }
        }
        if discovered.is_empty() {
            break;
        }
        level += 1;
        log::debug!(
            "Lineage of {root}, level {level}: loading partitions {:?}",
            discovered.keys().collect::<Vec<_>>()
        );

        for (partition, outcome) in loader.load_all(discovered.keys().copied()).await {
            for &unit_id in &discovered[&partition] {
                let record = match &outcome {
                    Ok(loaded) => loaded.get(unit_id).cloned().ok_or(
                        PartitionFetchError::MissingInstitution { partition, unit_id },
                    ),
                    Err(e) => Err(e.clone()),
                };
                match record {
                    Ok(record) => {
                        records.insert(unit_id, record);
                        frontier.push(unit_id);
                    }
                    Err(e) => {
                        failed.insert(unit_id, e);
                    }
                }
            }
        }
    }

    let warnings = unresolved_relationships(&records, &failed);
    let (relationships, conflicts) = relationships(&records);
    let nodes = build_nodes(&records, &relationships);
    log::debug!(
        "Lineage of {root} spans {} institutions and {} name periods",
        records.len(),
        nodes.len()
    );
    Ok(LineageChain {
        root,
        nodes: nodes.into(),
        records: records.into_values().collect(),
        warnings: warnings.into(),
        conflicts: conflicts.into(),
    })
}

/// Links of loaded records which point to institutions that failed to load
fn unresolved_relationships(
    records: &BTreeMap<UnitId, Arc<InstitutionRecord>>,
    failed: &HashMap<UnitId, PartitionFetchError>,
) -> Vec<UnresolvedRelationship> {
    let mut warnings = Vec::new();
    for record in records.values() {
        for link in record.links.iter() {
            let Some(error) = failed.get(&link.target) else {
                continue;
            };
            let warning = UnresolvedRelationship {
                from: record.unit_id,
                kind: link.kind,
                target: link.target,
                year: link.year,
                partition: error.partition(),
                cause: error.to_string().into(),
            };
            log::warn!("{warning}");
            warnings.push(warning);
        }
    }
    warnings.sort_unstable();
    warnings.dedup();
    warnings
}

/// Relationships between loaded institutions, after reconciling the
/// statements of both sides
///
/// When the statements about a (predecessor, successor) pair disagree, the
/// ones made by the relationship's subject win over mirrored ones, then the
/// earliest year wins. Disagreements on the year are reported as conflicts.
fn relationships(
    records: &BTreeMap<UnitId, Arc<InstitutionRecord>>,
) -> (Vec<Relationship>, Vec<LinkConflict>) {
    let mut statements = BTreeMap::<(UnitId, UnitId), Vec<Statement>>::new();
    for record in records.values() {
        for link in record.links.iter() {
            let (predecessor, successor) = link.endpoints(record.unit_id);
            if predecessor == successor {
                log::trace!("Ignoring self-relationship {link} of {}", record.unit_id);
                continue;
            }
            statements
                .entry((predecessor, successor))
                .or_default()
                .push(Statement {
                    kind: link.kind,
                    year: link.year,
                    direct: !link.inverse,
                });
        }
    }

    let mut relationships = Vec::with_capacity(statements.len());
    let mut conflicts = Vec::new();
    for ((predecessor, successor), statements) in statements {
        let any_direct = statements.iter().any(|statement| statement.direct);
        let chosen = (statements.iter())
            .filter(|statement| statement.direct || !any_direct)
            .min_by_key(|statement| (statement.year, statement.kind))
            .expect("statement lists are never empty");
        let mut years = statements.iter().map(|statement| statement.year).collect::<Vec<_>>();
        years.sort_unstable();
        years.dedup();
        if years.len() > 1 {
            let conflict = LinkConflict {
                predecessor,
                successor,
                kind: chosen.kind,
                chosen: chosen.year,
                years: years.into(),
            };
            log::warn!("Conflicting relationship statements: {conflict}");
            conflicts.push(conflict);
        }
        relationships.push(Relationship {
            predecessor,
            successor,
            kind: chosen.kind,
            year: chosen.year,
        });
    }
    (relationships, conflicts)
}

/// Split institutions into name periods, then connect the periods
fn build_nodes(
    records: &BTreeMap<UnitId, Arc<InstitutionRecord>>,
    relationships: &[Relationship],
) -> Vec<LineageNode> {
    let mut periods = (records.iter())
        .map(|(&unit_id, record)| (unit_id, name_periods(record)))
        .collect::<BTreeMap<_, _>>();

    for relationship in relationships {
        let target_name = periods
            .get(&relationship.successor)
            .filter(|successor| !successor.is_empty())
            .map(|successor| successor[period_at(successor, relationship.year)].name.clone());
        let Some(source) = periods
            .get_mut(&relationship.predecessor)
            .filter(|source| !source.is_empty())
        else {
            // The predecessor failed to load, which was already reported
            continue;
        };
        let pos = period_before(source, relationship.year);
        source[pos].edges.push(LineageEdge {
            kind: relationship.kind,
            target: relationship.successor,
            target_name,
            year: relationship.year,
        });
    }

    let mut nodes = periods.into_values().flatten().collect::<Vec<_>>();
    for node in &mut nodes {
        node.edges
            .sort_unstable_by_key(|edge| (edge.year, edge.target, edge.kind));
    }
    nodes.sort_by_key(|node| (node.years.start, node.unit_id));
    nodes
}

/// Periods during which an institution kept the same name, each connected to
/// the next one by a rename
fn name_periods(record: &InstitutionRecord) -> Vec<LineageNode> {
    let changes = record.name_changes().collect::<Vec<_>>();
    let mut periods = Vec::<LineageNode>::with_capacity(changes.len());
    for (idx, &(start, name)) in changes.iter().enumerate() {
        let end = match changes.get(idx + 1) {
            Some(&(next_start, _)) => next_start - 1,
            None => record.last_year().unwrap_or(start),
        };
        if let Some(previous) = periods.last_mut() {
            previous.edges.push(LineageEdge {
                kind: RelationKind::RenamedTo,
                target: record.unit_id,
                target_name: Some(name.into()),
                year: start,
            });
        }
        periods.push(LineageNode {
            unit_id: record.unit_id,
            name: name.into(),
            years: YearRange { start, end },
            edges: Vec::new(),
        });
    }
    periods
}

/// Period that was current just before some year, or the first period if
/// the year predates all of them
fn period_before(periods: &[LineageNode], year: Year) -> usize {
    (periods.iter())
        .rposition(|period| period.years.start < year)
        .unwrap_or(0)
}

/// Period that was current on some year, or the next one to start if there
/// is none, or the last one if the year is past all of them
fn period_at(periods: &[LineageNode], year: Year) -> usize {
    (periods.iter())
        .position(|period| period.years.end >= year)
        .unwrap_or(periods.len() - 1)
}
