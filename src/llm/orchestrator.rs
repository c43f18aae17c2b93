//! Prompt construction and four-category hint parsing (§4.J).

use crate::byteutil::find_subslice;
use crate::llm::categories::Solution;

const CATEGORY_MARKERS: [&str; 4] = ["Category 1:", "Category 2:", "Category 3:", "Category 4:"];
const RESPONSE_TERMINATOR: &str = "\", \"grade\"";

/// The two hint-length presets the original offers depending on overlay
/// density (compact panel vs. expanded panel) — see SPEC_FULL.md's
/// supplemented-features note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintLength {
    Short,
    Long,
}

impl HintLength {
    fn char_range(self) -> (u32, u32) {
        match self {
            HintLength::Short => (150, 300),
            HintLength::Long => (300, 500),
        }
    }
}

pub fn system_prompt(length: HintLength) -> String {
    let (lo, hi) = length.char_range();
    format!(
        "You generate four obscure hints, one per category, for a word-grouping puzzle. \
         Respond with exactly this format: Category 1: [hint]; Category 2: [hint]; \
         Category 3: [hint]; Category 4: [hint]. Each hint must be {lo}-{hi} characters, \
         cryptic rather than descriptive, and must not name any of the category's words directly."
    )
}

pub fn build_query(solution: &Solution) -> String {
    solution.format()
}

/// Locate the four `Category N:` markers and the `", "grade"` terminator;
/// each hint runs from 12 bytes past its marker to 4 bytes before the
/// next marker (or the terminator). A missing marker yields an empty
/// hint for that slot rather than failing the whole parse (§7 "Malformed
/// LLM response").
pub fn parse_response(response: &str) -> [String; 4] {
    let bytes = response.as_bytes();
    let positions: Vec<Option<usize>> = CATEGORY_MARKERS
        .iter()
        .map(|m| find_subslice(bytes, m.as_bytes()))
        .collect();
    let terminator_pos = find_subslice(bytes, RESPONSE_TERMINATOR.as_bytes());

    let mut hints: [String; 4] = Default::default();
    for i in 0..4 {
        let Some(pos) = positions[i] else { continue };
        let start = pos + 12;
        let end = positions
            .get(i + 1)
            .copied()
            .flatten()
            .or(terminator_pos)
            .map(|p| p.saturating_sub(4))
            .unwrap_or(bytes.len());
        if start < end && end <= bytes.len() {
            hints[i] = String::from_utf8_lossy(&bytes[start..end]).trim().to_string();
        }
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_four_categories_with_terminator() {
        let response = "\"text\":\"Category 1: first hint here; Category 2: second hint; \
             Category 3: third hint; Category 4: fourth hint\", \"grade\": 0}";
        let hints = parse_response(response);
        assert!(hints[0].starts_with("first hint"));
        assert!(hints[1].starts_with("second hint"));
        assert!(hints[2].starts_with("third hint"));
        assert!(hints[3].starts_with("fourth hint"));
    }

    #[test]
    fn missing_markers_yield_empty_strings() {
        let hints = parse_response("garbage, no markers at all");
        assert_eq!(hints, ["", "", "", ""]);
    }

    #[test]
    fn short_and_long_presets_differ() {
        assert_ne!(
            system_prompt(HintLength::Short),
            system_prompt(HintLength::Long)
        );
    }
}
