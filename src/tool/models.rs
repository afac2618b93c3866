//! What the separation tool produces for each model

/// Stages written by four-stem models, in the order the tool processes them
pub const FOUR_STEMS: &[&str] = &["drums", "bass", "other", "vocals"];

/// Stages written by six-stem models
pub const SIX_STEMS: &[&str] = &["drums", "bass", "other", "vocals", "guitar", "piano"];

/// Models known to write six stems; anything else is treated as four-stem
const SIX_STEM_MODELS: &[&str] = &["htdemucs_6s", "6-stem"];

/// Model folder names some tool versions write to regardless of `-n`
pub const ALTERNATE_MODEL_DIRS: &[&str] = &[
    "htdemucs",
    "htdemucs_ft",
    "htdemucs_6s",
    "mdx_extra",
    "mdx_extra_q",
];

/// Expected stage names for a model, in processing order
pub fn expected_stages(model: &str) -> &'static [&'static str] {
    if SIX_STEM_MODELS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(model.trim()))
    {
        SIX_STEMS
    } else {
        FOUR_STEMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_stem_models() {
        assert_eq!(expected_stages("htdemucs_6s").len(), 6);
        assert_eq!(expected_stages("6-stem").len(), 6);
    }

    #[test]
    fn test_unknown_model_defaults_to_four() {
        assert_eq!(expected_stages("htdemucs"), FOUR_STEMS);
        assert_eq!(expected_stages("some_future_model"), FOUR_STEMS);
        assert_eq!(expected_stages(""), FOUR_STEMS);
    }
}
