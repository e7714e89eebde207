use std::collections::BTreeSet;

/// Candidate IDs split into those still to fetch and those already stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub new: BTreeSet<String>,
    pub skipped: BTreeSet<String>,
}

/// Canonical string form of a listing ID.
///
/// IDs come from filenames, URLs and CSV cells; the latter may carry a `#`
/// prefix or a float suffix such as `123.0`.
pub fn normalize_id(raw: &str) -> Option<String> {
    let id = raw.trim().trim_start_matches('#').trim();
    let id = id.strip_suffix(".0").unwrap_or(id);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

pub fn partition<'a, C, E>(candidates: C, existing: E) -> Partition
where
    C: IntoIterator<Item = &'a String>,
    E: IntoIterator<Item = &'a String>,
{
    let existing: BTreeSet<String> = existing.into_iter().filter_map(|id| normalize_id(id)).collect();
    let mut out = Partition::default();

    for id in candidates.into_iter().filter_map(|id| normalize_id(id)) {
        if existing.contains(&id) {
            out.skipped.insert(id);
        } else {
            out.new.insert(id);
        }
    }
    out
}
