//! Task classification from lexical cues.
//!
//! Pure function of the query text; ties and cue-free queries default to
//! QA, the most conservative profile, so classification can never fail a
//! request.

use paperground_core::types::{TaskKind, TaskProfile};

const SUMMARIZE_CUES: &[&str] = &[
    "summarize",
    "summary",
    "summarise",
    "overview",
    "tl;dr",
    "main points",
    "key takeaways",
];

const COMPARE_CUES: &[&str] = &[
    "compare",
    "contrast",
    "versus",
    " vs ",
    " vs.",
    "difference between",
    "differences between",
    "how do they differ",
    "which is better",
];

// Bare "how"/"why" questions stay QA; Explain needs an explicit ask for
// exposition.
const EXPLAIN_CUES: &[&str] = &[
    "explain",
    "walk me through",
    "in simple terms",
    "step by step",
    "intuition behind",
    "what is the idea behind",
];

pub fn classify(query: &str) -> TaskProfile {
    let q = format!(" {} ", query.to_lowercase());
    let hits = |cues: &[&str]| cues.iter().filter(|c| q.contains(*c)).count();

    let scored = [
        (TaskKind::Summarize, hits(SUMMARIZE_CUES)),
        (TaskKind::Compare, hits(COMPARE_CUES)),
        (TaskKind::Explain, hits(EXPLAIN_CUES)),
    ];

    let best = scored.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if best == 0 {
        return TaskProfile::for_kind(TaskKind::Qa);
    }

    // A tie on the top cue count means the intent is ambiguous; fall
    // back to QA rather than guessing between task profiles.
    let mut leaders = scored.iter().filter(|(_, n)| *n == best);
    let (kind, _) = leaders.next().copied().unwrap_or((TaskKind::Qa, 0));
    if leaders.next().is_some() {
        return TaskProfile::for_kind(TaskKind::Qa);
    }
    TaskProfile::for_kind(kind)
}
