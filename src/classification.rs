//! Carnegie Classification vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification category assigned to an institution for a given year
///
/// This is a closed vocabulary: partition files only ever contain these codes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Classification {
    /// Doctoral University, very high research activity
    #[serde(rename = "R1")]
    DoctoralR1,

    /// Doctoral University, high research activity
    #[serde(rename = "R2")]
    DoctoralR2,

    /// Doctoral/Professional University
    #[serde(rename = "R3")]
    DoctoralR3,

    /// Master's College or University
    #[serde(rename = "M")]
    Masters,

    /// Baccalaureate College
    #[serde(rename = "B")]
    Baccalaureate,

    /// Associate's College
    #[serde(rename = "A")]
    Associates,

    /// Special Focus Two-Year Institution
    #[serde(rename = "SF2")]
    SpecialFocusTwoYear,

    /// Special Focus Four-Year Institution
    #[serde(rename = "SF4")]
    SpecialFocusFourYear,

    /// Tribal College
    #[serde(rename = "T")]
    Tribal,

    /// Not in the classification that year
    #[serde(rename = "NC")]
    NotClassified,
}
//
impl Classification {
    /// Every classification, in display order
    pub const ALL: [Self; 10] = [
        Self::DoctoralR1,
        Self::DoctoralR2,
        Self::DoctoralR3,
        Self::Masters,
        Self::Baccalaureate,
        Self::Associates,
        Self::SpecialFocusTwoYear,
        Self::SpecialFocusFourYear,
        Self::Tribal,
        Self::NotClassified,
    ];

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Self::DoctoralR1 => "Doctoral Universities: Very High Research Activity",
            Self::DoctoralR2 => "Doctoral Universities: High Research Activity",
            Self::DoctoralR3 => "Doctoral/Professional Universities",
            Self::Masters => "Master's Colleges & Universities",
            Self::Baccalaureate => "Baccalaureate Colleges",
            Self::Associates => "Associate's Colleges",
            Self::SpecialFocusTwoYear => "Special Focus Two-Year",
            Self::SpecialFocusFourYear => "Special Focus Four-Year",
            Self::Tribal => "Tribal Colleges",
            Self::NotClassified => "Not classified",
        }
    }

    /// Display group that this classification belongs to
    pub fn group(self) -> ClassificationGroup {
        match self {
            Self::DoctoralR1 | Self::DoctoralR2 | Self::DoctoralR3 => ClassificationGroup::Doctoral,
            Self::Masters => ClassificationGroup::Masters,
            Self::Baccalaureate => ClassificationGroup::Bachelors,
            Self::Associates => ClassificationGroup::Associates,
            Self::SpecialFocusTwoYear => ClassificationGroup::SpecialFocusTwoYear,
            Self::SpecialFocusFourYear => ClassificationGroup::SpecialFocusFourYear,
            Self::Tribal => ClassificationGroup::Tribal,
            Self::NotClassified => ClassificationGroup::NotIn,
        }
    }
}
//
impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse classification groups
///
/// The declaration order is the order in which groups are displayed, from the
/// most research-intensive institutions down to unclassified ones.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ClassificationGroup {
    Doctoral,
    Masters,
    Bachelors,
    Associates,
    SpecialFocusTwoYear,
    SpecialFocusFourYear,
    Tribal,
    NotIn,
}
//
impl ClassificationGroup {
    /// Short display label
    pub fn label(self) -> &'static str {
        match self {
            Self::Doctoral => "Doctoral",
            Self::Masters => "Master's",
            Self::Bachelors => "Bachelor's",
            Self::Associates => "Associates",
            Self::SpecialFocusTwoYear => "SF: 2Yr",
            Self::SpecialFocusFourYear => "SF: 4Yr",
            Self::Tribal => "Tribal/Oth",
            Self::NotIn => "Not in",
        }
    }
}
//
impl fmt::Display for ClassificationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_follow_display_order() {
        let groups = Classification::ALL.map(Classification::group);
        assert!(groups.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(groups[0], ClassificationGroup::Doctoral);
        assert_eq!(groups[9], ClassificationGroup::NotIn);
    }

    #[test]
    fn codes_are_unique() {
        let mut codes = Classification::ALL
            .map(|classification| serde_json::to_string(&classification).unwrap())
            .to_vec();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), Classification::ALL.len());
    }
}
