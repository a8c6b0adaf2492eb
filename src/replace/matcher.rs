use serde::Deserialize;

use crate::replace::group::TextGroup;

/// What happens to a group that receives no translated segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum UnmatchedPolicy {
    /// Leave the original text untouched.
    #[default]
    #[serde(rename = "skip")]
    Skip,
    /// Erase the original text and draw nothing.
    #[serde(rename = "erase")]
    EraseOnly,
}

/// One group paired with the text that replaces it. An empty `segment` means
/// the group has no counterpart in the translation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementPlan<'a> {
    pub group: &'a TextGroup,
    pub segment: String,
}

impl ReplacementPlan<'_> {
    pub fn is_unmatched(&self) -> bool {
        self.segment.trim().is_empty()
    }
}

/// Pairs translated lines with groups by position. Always yields exactly one
/// plan per group: missing lines leave trailing groups unmatched, and surplus
/// lines are appended to the last group.
pub fn match_segments<'a>(groups: &'a [TextGroup], translated: &str) -> Vec<ReplacementPlan<'a>> {
    let segments = split_segments(translated);
    let Some(last_index) = groups.len().checked_sub(1) else {
        return Vec::new();
    };

    groups
        .iter()
        .enumerate()
        .map(|(idx, group)| {
            let segment = if idx == last_index && segments.len() > groups.len() {
                segments[idx..].join("\n")
            } else {
                segments.get(idx).cloned().unwrap_or_default()
            };
            ReplacementPlan { group, segment }
        })
        .collect()
}

/// Non-blank lines of `translated`, trimmed.
pub fn split_segments(translated: &str) -> Vec<String> {
    translated
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Quad;
    use crate::ocr::TextFragment;

    fn groups(count: usize) -> Vec<TextGroup> {
        (0..count)
            .filter_map(|idx| {
                TextGroup::from_members(vec![TextFragment::new(
                    format!("g{idx}"),
                    Quad::from_rect(0.0, idx as f32 * 40.0, 50.0, 20.0),
                    90.0,
                )])
            })
            .collect()
    }

    fn segments(plans: &[ReplacementPlan<'_>]) -> Vec<String> {
        plans.iter().map(|plan| plan.segment.clone()).collect()
    }

    #[test]
    fn equal_counts_pair_by_index() {
        let groups = groups(3);
        let plans = match_segments(&groups, "un\ndeux\ntrois");
        assert_eq!(segments(&plans), vec!["un", "deux", "trois"]);
        assert!(std::ptr::eq(plans[1].group, &groups[1]));
    }

    #[test]
    fn missing_lines_leave_trailing_groups_unmatched() {
        let groups = groups(3);
        let plans = match_segments(&groups, "un");
        assert_eq!(plans.len(), 3);
        assert!(!plans[0].is_unmatched());
        assert!(plans[1].is_unmatched() && plans[2].is_unmatched());
    }

    #[test]
    fn surplus_lines_go_to_the_last_group() {
        let groups = groups(2);
        let plans = match_segments(&groups, "a\nb\nc\nd");
        assert_eq!(segments(&plans), vec!["a", "b\nc\nd"]);
    }

    #[test]
    fn plan_count_always_equals_group_count() {
        for group_count in 1..6 {
            let groups = groups(group_count);
            for text in ["", "x", "x\ny", "1\n2\n3\n4\n5\n6\n7\n8", "\n\n\n"] {
                assert_eq!(match_segments(&groups, text).len(), group_count);
            }
        }
        assert!(match_segments(&[], "anything").is_empty());
    }

    #[test]
    fn blank_lines_are_not_segments() {
        assert_eq!(split_segments("a\n\n  \nb\r\n"), vec!["a", "b"]);
    }
}
