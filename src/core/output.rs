//! Compact output rendering helpers for CLI and report surfaces.
//!
//! Keeps free-form comment text bounded and readable while preserving signal.

/// Collapse newlines/extra whitespace and bound length for display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Scores always render with one decimal place ("66.7", "100.0").
pub fn format_score(score: f64) -> String {
    format!("{:.1}", score)
}

/// Human label for an instance status string ("needs_rework" -> "needs rework").
pub fn status_label(status: &str) -> String {
    status.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_line_collapses_and_bounds() {
        let input = "weld seam\n  shows   undercut near flange";
        assert_eq!(
            compact_line(input, 100),
            "weld seam shows undercut near flange"
        );
        assert_eq!(compact_line(input, 9), "weld seam...");
    }

    #[test]
    fn test_format_score_one_decimal() {
        assert_eq!(format_score(66.7), "66.7");
        assert_eq!(format_score(100.0), "100.0");
        assert_eq!(format_score(0.0), "0.0");
    }

    #[test]
    fn test_status_label() {
        assert_eq!(status_label("needs_rework"), "needs rework");
        assert_eq!(status_label("draft"), "draft");
    }
}
