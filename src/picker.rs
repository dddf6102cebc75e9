//! Interactive institution selection

use campus_lineage::{Candidate, LineageChain, UnitId};
use dialoguer::FuzzySelect;

/// Ask the user which of several homonymous institutions they meant
pub fn pick_candidate(query: &str, candidates: &[Candidate]) -> dialoguer::Result<UnitId> {
    let names = candidates
        .iter()
        .map(|candidate| candidate.to_string())
        .collect::<Vec<_>>();
    let idx = FuzzySelect::new()
        .with_prompt(format!("Several institutions match {query:?}, which one?"))
        .items(&names)
        .default(0)
        .max_length(usize::MAX)
        .interact()?;
    Ok(candidates[idx].unit_id)
}

/// Ask the user which related institution should be shown next, if any
pub fn pick_related(chain: &LineageChain) -> dialoguer::Result<Option<UnitId>> {
    let related = chain.related().collect::<Vec<_>>();
    if related.is_empty() {
        return Ok(None);
    }
    let mut items = related
        .iter()
        .map(|(unit_id, name)| format!("{name} [{unit_id}]"))
        .collect::<Vec<_>>();
    items.push("Quit".to_owned());
    let idx = FuzzySelect::new()
        .with_prompt("Associated names")
        .items(&items)
        .default(0)
        .max_length(usize::MAX)
        .interact()?;
    Ok(related.get(idx).map(|&(unit_id, _)| unit_id))
}
