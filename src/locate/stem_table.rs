//! File base name to stem kind lookup
//!
//! Files whose base name is not in this table are not stems and are ignored.

use crate::types::StemKind;

/// Canonical stage names and the kind each one maps to
pub const STEM_TABLE: &[(&str, StemKind)] = &[
    ("drums", StemKind::Drums),
    ("bass", StemKind::Bass),
    ("vocals", StemKind::Vocals),
    ("guitar", StemKind::ElectricGuitar),
    ("piano", StemKind::Piano),
    ("other", StemKind::Other),
];

/// Case-insensitive lookup of a file base name
///
/// Returns the canonical stage name along with the kind.
pub fn lookup(base_name: &str) -> Option<(&'static str, StemKind)> {
    STEM_TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(base_name))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("Drums"), Some(("drums", StemKind::Drums)));
        assert_eq!(lookup("VOCALS"), Some(("vocals", StemKind::Vocals)));
        assert_eq!(lookup("guitar"), Some(("guitar", StemKind::ElectricGuitar)));
    }

    #[test]
    fn test_unknown_names_are_unmapped() {
        assert_eq!(lookup("no_vocals"), None);
        assert_eq!(lookup("strings"), None);
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn test_reserved_kinds_are_unreachable() {
        assert!(STEM_TABLE
            .iter()
            .all(|(_, k)| !matches!(k, StemKind::AcousticGuitar | StemKind::Strings)));
    }
}
