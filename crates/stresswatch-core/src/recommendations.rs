//! Fixed recommendation table keyed by stress label.

use stresswatch_types::StressLabel;

const LOW: &[&str] = &[
    "Stress appears low. Keep up the current routine.",
    "Take short movement breaks to stay relaxed.",
    "Stay hydrated and keep a regular sleep schedule.",
];

const MODERATE: &[&str] = &[
    "Try slow breathing: inhale for 4 seconds, exhale for 6 seconds.",
    "Step away from the screen for a few minutes.",
    "Loosen the jaw and shoulders and relax the brow.",
    "Prioritise the next task and set the rest aside for now.",
];

const HIGH: &[&str] = &[
    "Pause the current activity and take several slow, deep breaths.",
    "Move to a quiet space and rest for 5-10 minutes.",
    "Talk to someone you trust about what is causing pressure.",
    "If high stress persists, consider contacting a health professional.",
];

pub fn recommendations_for(label: StressLabel) -> &'static [&'static str] {
    match label {
        StressLabel::Low => LOW,
        StressLabel::Moderate => MODERATE,
        StressLabel::High => HIGH,
    }
}

/// Owned copy for embedding in a summary.
pub fn recommendation_list(label: StressLabel) -> Vec<String> {
    recommendations_for(label)
        .iter()
        .map(|s| s.to_string())
        .collect()
}
