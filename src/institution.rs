//! Institutions and the relationships between them

use crate::{classification::Classification, UnitId, Year};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Degree-granting status of an institution over one year
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum DegreeStatus {
    /// The institution awarded degrees that year
    #[serde(rename = "Y")]
    Granting,

    /// The institution did not award degrees that year
    #[serde(rename = "N")]
    NonGranting,
}
//
impl DegreeStatus {
    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Self::Granting => "degree-granting",
            Self::NonGranting => "non-degree-granting",
        }
    }
}
//
impl fmt::Display for DegreeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What we know about an institution over one year
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct YearData {
    /// Year on which the data was recorded
    pub year: Year,

    /// Name that the institution went by that year
    pub name: Box<str>,

    /// Classification category, if the institution was classified
    pub classification: Option<Classification>,

    /// Degree-granting status, if known
    pub degree_status: Option<DegreeStatus>,
}

/// Kind of relationship between a predecessor and a successor institution
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum RelationKind {
    /// Predecessor continued under a new identifier and name
    RenamedTo,

    /// Predecessor merged into the successor
    MergedInto,

    /// Predecessor was absorbed by the successor
    AbsorbedBy,

    /// Successor split from the predecessor
    SplitFrom,

    /// Successor took over from the predecessor
    SuccessorOf,
}
//
impl RelationKind {
    /// Every relation kind
    pub const ALL: [Self; 5] = [
        Self::RenamedTo,
        Self::MergedInto,
        Self::AbsorbedBy,
        Self::SplitFrom,
        Self::SuccessorOf,
    ];

    /// Name of this relation in partition files
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RenamedTo => "renamed-to",
            Self::MergedInto => "merged-into",
            Self::AbsorbedBy => "absorbed-by",
            Self::SplitFrom => "split-from",
            Self::SuccessorOf => "successor-of",
        }
    }

    /// Truth that the subject of a statement of this kind is the predecessor
    ///
    /// "A merged-into B" is stated by A, the predecessor, whereas "B
    /// split-from A" is stated by B, the successor.
    pub fn subject_is_predecessor(self) -> bool {
        matches!(self, Self::RenamedTo | Self::MergedInto | Self::AbsorbedBy)
    }
}
//
impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
//
impl FromStr for RelationKind {
    type Err = LinkSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LinkSyntaxError::new(s, "unknown relation kind"))
    }
}

/// Relationship link, as stated in an institution record
///
/// In partition files, links are written as `[^]kind:target@year`, where the
/// optional `^` marks an inverse link.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Link {
    /// Kind of relationship
    pub kind: RelationKind,

    /// Other institution involved in the relationship
    pub target: UnitId,

    /// Year on which the relationship took effect
    pub year: Year,

    /// Truth that this link was stated by the target and mirrored into the
    /// record holding it, rather than stated by the holder itself
    pub inverse: bool,
}
//
impl Link {
    /// Predecessor and successor of this link, given the identifier of the
    /// record that holds it
    pub fn endpoints(&self, holder: UnitId) -> (UnitId, UnitId) {
        let (subject, object) = if self.inverse {
            (self.target, holder)
        } else {
            (holder, self.target)
        };
        if self.kind.subject_is_predecessor() {
            (subject, object)
        } else {
            (object, subject)
        }
    }

    /// Truth that the target comes after the holder in the lineage
    pub fn points_forward(&self, holder: UnitId) -> bool {
        self.endpoints(holder).0 == holder
    }

    /// Same link, as it should be recorded into the target's record
    pub fn mirror(&self, holder: UnitId) -> Self {
        Self {
            target: holder,
            inverse: !self.inverse,
            ..*self
        }
    }
}
//
impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inverse = if self.inverse { "^" } else { "" };
        write!(f, "{inverse}{}:{}@{}", self.kind, self.target, self.year)
    }
}
//
impl FromStr for Link {
    type Err = LinkSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (inverse, body) = match s.strip_prefix('^') {
            Some(body) => (true, body),
            None => (false, s),
        };
        let (kind, rest) = body
            .split_once(':')
            .ok_or_else(|| LinkSyntaxError::new(s, "missing ':' after the relation kind"))?;
        let (target, year) = rest
            .split_once('@')
            .ok_or_else(|| LinkSyntaxError::new(s, "missing '@' before the year"))?;
        Ok(Self {
            kind: kind.parse().map_err(|_| LinkSyntaxError::new(s, "unknown relation kind"))?,
            target: target
                .parse()
                .map_err(|_| LinkSyntaxError::new(s, "target is not an institution identifier"))?,
            year: year
                .parse()
                .map_err(|_| LinkSyntaxError::new(s, "year is not a number"))?,
            inverse,
        })
    }
}

/// Malformed relationship link
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid relationship link {link:?}: {reason}")]
pub struct LinkSyntaxError {
    /// Offending text
    link: Box<str>,

    /// What is wrong with it
    reason: &'static str,
}
//
impl LinkSyntaxError {
    fn new(link: &str, reason: &'static str) -> Self {
        Self {
            link: link.into(),
            reason,
        }
    }
}

/// Separator between links in a partition file column
pub const LINK_SEPARATOR: char = '|';

/// Parse a list of links from a partition file column
pub fn parse_links(column: &str) -> Result<Vec<Link>, LinkSyntaxError> {
    column
        .split(LINK_SEPARATOR)
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .map(str::parse)
        .collect()
}

/// Format a list of links into a partition file column
pub fn format_links(links: &[Link]) -> String {
    let mut column = String::new();
    for (idx, link) in links.iter().enumerate() {
        if idx > 0 {
            column.push(LINK_SEPARATOR);
        }
        column.push_str(&link.to_string());
    }
    column
}

/// Full history of one institution
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct InstitutionRecord {
    /// Stable identifier
    pub unit_id: UnitId,

    /// Most recent name
    pub current_name: Box<str>,

    /// Yearly observations, sorted by increasing year, one per year
    pub years: Box<[YearData]>,

    /// Relationship links, sorted and deduplicated
    pub links: Box<[Link]>,
}
//
impl InstitutionRecord {
    /// First year where the institution was observed
    pub fn first_year(&self) -> Option<Year> {
        self.years.first().map(|data| data.year)
    }

    /// Last year where the institution was observed
    pub fn last_year(&self) -> Option<Year> {
        self.years.last().map(|data| data.year)
    }

    /// Historical names, as (first year of use, name) pairs
    pub fn name_changes(&self) -> impl Iterator<Item = (Year, &str)> + '_ {
        change_points(&self.years, |data| &*data.name)
    }

    /// Classification history, as (first year, classification) pairs
    pub fn classification_changes(
        &self,
    ) -> impl Iterator<Item = (Year, Option<Classification>)> + '_ {
        change_points(&self.years, |data| data.classification)
    }

    /// Degree-granting status history, as (first year, status) pairs
    pub fn degree_status_changes(&self) -> impl Iterator<Item = (Year, Option<DegreeStatus>)> + '_ {
        change_points(&self.years, |data| data.degree_status)
    }

    /// Earliest institution that this one led to, if any
    pub fn successor(&self) -> Option<(UnitId, Year)> {
        (self.links.iter())
            .filter(|link| link.points_forward(self.unit_id))
            .map(|link| (link.target, link.year))
            .min_by_key(|&(target, year)| (year, target))
    }

    /// Institutions that led to this one
    pub fn predecessors(&self) -> impl Iterator<Item = (UnitId, Year)> + '_ {
        (self.links.iter())
            .filter(|link| !link.points_forward(self.unit_id))
            .map(|link| (link.target, link.year))
    }

    /// Merger or absorption links, in either direction
    pub fn mergers(&self) -> impl Iterator<Item = &Link> + '_ {
        (self.links.iter())
            .filter(|link| matches!(link.kind, RelationKind::MergedInto | RelationKind::AbsorbedBy))
    }
}

/// Years where some field of the yearly data changes value, along with the
/// new value of that field
fn change_points<'record, T: Clone + PartialEq + 'record>(
    years: &'record [YearData],
    field: impl Fn(&'record YearData) -> T + 'record,
) -> impl Iterator<Item = (Year, T)> + 'record {
    let mut last = None;
    years.iter().filter_map(move |data| {
        let value = field(data);
        if last.as_ref() == Some(&value) {
            return None;
        }
        last = Some(value.clone());
        Some((data.year, value))
    })
}
