//! Entity id normalization for seed alias resolution (regex-based).

use regex::Regex;
use std::sync::OnceLock;

/// Legal-form suffixes that do not distinguish companies.
const COMPANY_SUFFIXES: [&str; 10] = [
    "inc", "incorporated", "corp", "corporation", "ltd", "llc", "co", "company", "plc", "gmbh",
];

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"))
}

fn suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = COMPANY_SUFFIXES
            .iter()
            .chain(std::iter::once(&"ag"))
            .copied()
            .collect::<Vec<_>>()
            .join("|");
        // Trailing ", Inc." / " Corp" / " AG" style suffixes, repeated ("Foo Co Ltd")
        Regex::new(&format!(r"(?:[\s,]+(?:{})\.?)+$", alternation)).expect("Invalid regex pattern")
    })
}

/// Canonical form of a free-text entity name.
///
/// "Acme  Corp." -> "acme", "Taiwan Semiconductor Co., Ltd." -> "taiwan_semiconductor".
/// A name made only of a suffix is kept rather than emptied.
pub fn normalize_entity_id(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let collapsed = whitespace_regex().replace_all(&lowered, " ");
    let stripped = suffix_regex().replace(&collapsed, "");
    let stripped = stripped.trim().trim_end_matches(',').trim();
    let base = if stripped.is_empty() { collapsed.trim() } else { stripped };
    base.replace(' ', "_")
}
