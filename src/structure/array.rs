use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayMatch {
    pub index: u32,
    /// Identifier with the index pattern removed.
    pub base: String,
}

/// Recognises repeat indices in field identifiers. Substitute an
/// implementation to change how repeatable groups are detected.
pub trait ArrayPatternDetector: Send + Sync {
    fn detect(&self, identifier: &str) -> Option<ArrayMatch>;
}

/// Checked in order; the first capture that parses as an index wins.
static INDEX_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\[(\d+)\]", ""),
        (r"_(\d+)$", ""),
        (r"_(\d+)_", "_"),
        (r"(\d+)$", ""),
    ]
    .into_iter()
    .filter_map(|(pattern, joiner)| Regex::new(pattern).ok().map(|re| (re, joiner)))
    .collect()
});

/// Suffix conventions: `school_1`, `edu[0].school`, `edu_2_school`, `school3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixPatternDetector;

impl ArrayPatternDetector for SuffixPatternDetector {
    fn detect(&self, identifier: &str) -> Option<ArrayMatch> {
        INDEX_PATTERNS.iter().find_map(|(re, joiner)| {
            let caps = re.captures(identifier)?;
            let whole = caps.get(0)?;
            let index = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let base = format!(
                "{}{}{}",
                &identifier[..whole.start()],
                joiner,
                &identifier[whole.end()..]
            );
            let base = base
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_string();
            Some(ArrayMatch { index, base })
        })
    }
}

/// Outcome of running a detector over one group's identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDetection {
    pub matches: Vec<Option<ArrayMatch>>,
    pub ratio: f64,
    pub is_repeatable: bool,
}

pub fn detect_group(
    detector: &dyn ArrayPatternDetector,
    identifiers: &[&str],
    ratio_threshold: f64,
) -> ArrayDetection {
    let matches: Vec<Option<ArrayMatch>> = identifiers.iter().map(|id| detector.detect(id)).collect();
    let hits = matches.iter().filter(|m| m.is_some()).count();
    let ratio = if identifiers.is_empty() {
        0.0
    } else {
        hits as f64 / identifiers.len() as f64
    };
    ArrayDetection {
        is_repeatable: identifiers.len() >= 2 && ratio > ratio_threshold,
        matches,
        ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn found(index: u32, base: &str) -> Option<ArrayMatch> {
        Some(ArrayMatch {
            index,
            base: base.to_string(),
        })
    }

    #[test]
    fn detects_suffix_conventions() {
        let detector = SuffixPatternDetector;
        assert_eq!(detector.detect("school_1"), found(1, "school"));
        assert_eq!(detector.detect("edu[0].school"), found(0, "edu.school"));
        assert_eq!(detector.detect("edu_2_school"), found(2, "edu_school"));
        assert_eq!(detector.detect("#major3"), found(3, "major"));
        assert_eq!(detector.detect("email"), None);
    }

    #[test]
    fn majority_threshold_flags_repeatable() {
        let detector = SuffixPatternDetector;
        let detection = detect_group(&detector, &["school_1", "major_1", "school_2"], 0.5);
        assert!(detection.is_repeatable);
        assert_eq!(detection.ratio, 1.0);

        let half = detect_group(&detector, &["school_1", "email"], 0.5);
        assert!(!half.is_repeatable);

        let single = detect_group(&detector, &["school_1"], 0.5);
        assert!(!single.is_repeatable);
    }
}
