//! The fixed label schema.
//!
//! Every component indexes into this list positionally: teacher probability
//! vectors, supervision targets, model logits, and metric reports all agree
//! that index `i` means `LABEL_KEYS[i]`. The order is defined once here and
//! shared by the training and evaluation paths; nothing is allowed to reorder
//! it at runtime.

/// Width of every label vector and of the student's output layer.
pub const NUM_LABELS: usize = 15;

/// Ordered label names. The final entry is the aggregate `overall_cringe`
/// score; the rest are individual content-quality attributes.
pub const LABEL_KEYS: [&str; NUM_LABELS] = [
    "humbleBragging",
    "excessiveEmojis",
    "engagementBait",
    "fakeStories",
    "companyCulture",
    "personalAnecdotes",
    "hiringStories",
    "basicDecencyPraising",
    "minorAchievements",
    "buzzwordOveruse",
    "linkedinCliches",
    "virtueSignaling",
    "professionalOversharing",
    "mundaneLifeLessons",
    "overall_cringe",
];

/// Position of `name` in the schema, or `None` for an unknown label.
pub fn label_index(name: &str) -> Option<usize> {
    LABEL_KEYS.iter().position(|&l| l == name)
}
