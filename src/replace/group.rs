use serde::Serialize;

use crate::geometry::Bounds;
use crate::ocr::TextFragment;

/// Fragments whose tops differ by more than this start a new group.
pub const DEFAULT_LINE_GAP_PX: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingConfig {
    pub line_gap_px: u32,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            line_gap_px: DEFAULT_LINE_GAP_PX,
        }
    }
}

/// A paragraph-level cluster of fragments, members ordered left to right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextGroup {
    pub members: Vec<TextFragment>,
    pub bounds: Bounds,
    pub original_text: String,
}

impl TextGroup {
    /// `None` for an empty member list.
    pub fn from_members(mut members: Vec<TextFragment>) -> Option<Self> {
        members.sort_by(|a, b| left_of(a).total_cmp(&left_of(b)));
        let bounds = members
            .iter()
            .map(TextFragment::bounds)
            .reduce(|acc, next| acc.union(&next))?;
        let original_text = members
            .iter()
            .map(|member| member.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Some(Self {
            members,
            bounds,
            original_text,
        })
    }
}

/// Single pass over fragments sorted by top edge.
pub fn group(fragments: Vec<TextFragment>, config: &GroupingConfig) -> Vec<TextGroup> {
    let mut sorted = fragments;
    sorted.sort_by(|a, b| top_of(a).total_cmp(&top_of(b)));

    let mut buckets: Vec<Vec<TextFragment>> = Vec::new();
    let mut previous_top: Option<f32> = None;
    for fragment in sorted {
        let top = top_of(&fragment);
        let starts_group = match previous_top {
            Some(prev) => top - prev > config.line_gap_px as f32,
            None => true,
        };
        previous_top = Some(top);
        match buckets.last_mut() {
            Some(bucket) if !starts_group => bucket.push(fragment),
            _ => buckets.push(vec![fragment]),
        }
    }

    buckets
        .into_iter()
        .filter_map(TextGroup::from_members)
        .collect()
}

fn top_of(fragment: &TextFragment) -> f32 {
    fragment
        .quad
        .points()
        .iter()
        .map(|point| point.y)
        .fold(f32::INFINITY, f32::min)
}

fn left_of(fragment: &TextFragment) -> f32 {
    fragment
        .quad
        .points()
        .iter()
        .map(|point| point.x)
        .fold(f32::INFINITY, f32::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Quad;

    fn word(text: &str, left: f32, top: f32, width: f32, height: f32) -> TextFragment {
        TextFragment::new(text, Quad::from_rect(left, top, width, height), 90.0)
    }

    #[test]
    fn empty_and_single_inputs() {
        assert!(group(Vec::new(), &GroupingConfig::default()).is_empty());
        let groups = group(vec![word("HELLO", 0.0, 0.0, 100.0, 30.0)], &GroupingConfig::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].original_text, "HELLO");
    }

    #[test]
    fn stacked_words_form_separate_groups() {
        let fragments = vec![
            word("C", 0.0, 60.0, 20.0, 15.0),
            word("A", 0.0, 0.0, 20.0, 15.0),
            word("B", 0.0, 30.0, 20.0, 15.0),
        ];
        let groups = group(fragments, &GroupingConfig::default());
        let texts: Vec<_> = groups.iter().map(|g| g.original_text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
        assert!(groups.iter().all(|g| g.members.len() == 1));
    }

    #[test]
    fn same_line_words_join_left_to_right() {
        let fragments = vec![
            word("world", 120.0, 12.0, 80.0, 20.0),
            word("Hello", 10.0, 10.0, 90.0, 22.0),
            word("again", 210.0, 14.0, 70.0, 20.0),
        ];
        let groups = group(fragments, &GroupingConfig::default());
        assert_eq!(groups.len(), 1);
        let only = &groups[0];
        assert_eq!(only.original_text, "Hello world again");
        let lefts: Vec<_> = only.members.iter().map(|m| m.bounds().left).collect();
        assert!(lefts.windows(2).all(|pair| pair[0] <= pair[1]));
        let union = only
            .members
            .iter()
            .map(TextFragment::bounds)
            .reduce(|a, b| a.union(&b))
            .expect("members");
        assert_eq!(only.bounds, union);
        assert_eq!(
            (only.bounds.left, only.bounds.top, only.bounds.right, only.bounds.bottom),
            (10, 10, 280, 34)
        );
    }

    #[test]
    fn gap_is_measured_from_the_previous_fragment() {
        let fragments = vec![
            word("a1", 0.0, 0.0, 10.0, 10.0),
            word("a2", 20.0, 8.0, 10.0, 10.0),
            word("a3", 40.0, 16.0, 10.0, 10.0),
            word("b1", 0.0, 40.0, 10.0, 10.0),
        ];
        let groups = group(fragments, &GroupingConfig { line_gap_px: 10 });
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 3);
    }

    #[test]
    fn serializes_bounds_and_members() {
        let groups = group(vec![word("Agenda", 4.0, 6.0, 60.0, 18.0)], &GroupingConfig::default());
        let value = serde_json::to_value(&groups[0]).expect("json");
        assert_eq!(value["original_text"], "Agenda");
        assert_eq!(value["bounds"]["right"], 64);
        assert_eq!(value["members"][0]["quad"][2]["y"], 24.0);
    }
}
