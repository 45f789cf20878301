//! Variant resolution
//!
//! Maps a logical bundle name plus the session's ordered variant preference
//! list to the single concrete artifact name to fetch. Resolution is a pure
//! function of (logical name, declared variants, preference order): no side
//! effects, deterministic across repeated and concurrent calls. Diagnostics
//! are returned to the caller, which decides whether to log them.

use std::fmt;

use crate::manifest::ManifestIndex;

/// Non-fatal observations made while resolving a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantDiagnostic {
    /// The manifest records no variants for this logical name; the
    /// lowest-priority declared preference was appended as a documented
    /// fallback.
    NoVariantsRecorded { logical: String, chosen: String },

    /// None of the declared variants appear in the preference list; the
    /// first declared variant was picked deterministically.
    AmbiguousVariant { logical: String, chosen: String },
}

impl fmt::Display for VariantDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantDiagnostic::NoVariantsRecorded { logical, chosen } => write!(
                f,
                "no variants recorded for '{logical}', falling back to '{chosen}'"
            ),
            VariantDiagnostic::AmbiguousVariant { logical, chosen } => write!(
                f,
                "ambiguous variant for '{logical}': no active preference matched, chose '{chosen}'"
            ),
        }
    }
}

/// Rank of a declared variant that matches no preference slot: below every
/// matched preference, above nothing.
const UNMATCHED_RANK: usize = usize::MAX - 1;

/// Resolve a logical bundle name to its concrete artifact name.
///
/// Any existing `.variant` suffix on the input is stripped first, so the
/// function is idempotent over its own output. With no manifest installed the
/// behavior matches an installed manifest that records no variants.
pub fn resolve(
    logical_name: &str,
    index: Option<&ManifestIndex>,
    preferences: &[String],
) -> (String, Option<VariantDiagnostic>) {
    let stem = logical_name
        .split_once('.')
        .map_or(logical_name, |(stem, _)| stem);

    let declared = index.map(|idx| idx.variants_of(stem)).unwrap_or(&[]);

    if declared.is_empty() {
        // Documented fallback: use the lowest-priority declared preference
        // when nothing matches. With an empty preference list the stem is
        // returned unchanged instead of indexing past the end.
        let chosen = match preferences.last() {
            Some(tag) => format!("{stem}.{tag}"),
            None => stem.to_string(),
        };
        let diagnostic = VariantDiagnostic::NoVariantsRecorded {
            logical: stem.to_string(),
            chosen: chosen.clone(),
        };
        return (chosen, Some(diagnostic));
    }

    let mut best_rank = usize::MAX;
    let mut best_index = 0;
    for (i, variant) in declared.iter().enumerate() {
        let rank = preferences
            .iter()
            .position(|pref| pref == variant)
            .unwrap_or(UNMATCHED_RANK);
        if rank < best_rank {
            best_rank = rank;
            best_index = i;
        }
    }

    let chosen = format!("{stem}.{}", declared[best_index]);
    let diagnostic = (best_rank == UNMATCHED_RANK).then(|| VariantDiagnostic::AmbiguousVariant {
        logical: stem.to_string(),
        chosen: chosen.clone(),
    });

    (chosen, diagnostic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    fn index(bundles: &[&str]) -> ManifestIndex {
        ManifestIndex::new(Manifest {
            bundles: bundles.iter().map(|s| s.to_string()).collect(),
            ..Manifest::default()
        })
    }

    fn prefs(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_picks_lowest_preference_index() {
        let idx = index(&["ui.hd", "ui.sd"]);
        let (concrete, diag) = resolve("ui", Some(&idx), &prefs(&["sd", "hd"]));
        assert_eq!(concrete, "ui.sd");
        assert!(diag.is_none());
    }

    #[test]
    fn test_strips_existing_suffix_before_resolving() {
        let idx = index(&["ui.hd", "ui.sd"]);
        let (concrete, _) = resolve("ui.hd", Some(&idx), &prefs(&["sd", "hd"]));
        assert_eq!(concrete, "ui.sd");
    }

    #[test]
    fn test_no_declared_variants_appends_last_preference() {
        let idx = index(&["other.sd"]);
        let (concrete, diag) = resolve("ui", Some(&idx), &prefs(&["sd", "hd"]));
        assert_eq!(concrete, "ui.hd");
        assert!(matches!(
            diag,
            Some(VariantDiagnostic::NoVariantsRecorded { .. })
        ));
    }

    #[test]
    fn test_no_preference_match_picks_first_declared() {
        let idx = index(&["ui.fr", "ui.de"]);
        let (concrete, diag) = resolve("ui", Some(&idx), &prefs(&["sd", "hd"]));
        assert_eq!(concrete, "ui.fr");
        assert!(matches!(
            diag,
            Some(VariantDiagnostic::AmbiguousVariant { .. })
        ));
    }

    #[test]
    fn test_empty_preferences_degrade_gracefully() {
        let (concrete, diag) = resolve("ui", None, &[]);
        assert_eq!(concrete, "ui");
        assert!(diag.is_some());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let idx = index(&["ui.hd", "ui.sd", "ui.fr"]);
        let preferences = prefs(&["sd", "hd"]);
        let first = resolve("ui", Some(&idx), &preferences);
        for _ in 0..16 {
            assert_eq!(resolve("ui", Some(&idx), &preferences), first);
        }
    }
}
