use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width in terminal cells. Hangul syllables take two cells.
pub fn display_width(s: &str) -> usize {
    s.graphemes(true).map(UnicodeWidthStr::width).sum()
}

/// Truncate a string to fit within `max_cells` terminal cells, appending `…` if truncated.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if max_cells == 0 {
        return String::new();
    }
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells <= 1 {
        return "\u{2026}".to_string();
    }
    let budget = max_cells - 1; // reserve 1 cell for '…'
    let mut width = 0;
    let mut result = String::new();
    for grapheme in s.graphemes(true) {
        let gw = UnicodeWidthStr::width(grapheme);
        if width + gw > budget {
            break;
        }
        width += gw;
        result.push_str(grapheme);
    }
    result.push('\u{2026}');
    result
}

/// Fit `s` into exactly `cells` columns: truncated when longer, padded
/// with spaces when shorter.
pub fn pad_to_width(s: &str, cells: usize) -> String {
    let mut out = truncate_to_width(s, cells);
    let width = display_width(&out);
    out.extend(std::iter::repeat_n(' ', cells.saturating_sub(width)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── display_width ──────────────────────────────────────────────

    #[test]
    fn display_width_hangul() {
        assert_eq!(display_width("이사 준비"), 9);
    }

    #[test]
    fn display_width_emoji() {
        assert_eq!(display_width("🔴"), 2);
    }

    #[test]
    fn display_width_combining() {
        assert_eq!(display_width("cafe\u{0301}"), 4);
    }

    #[test]
    fn display_width_empty() {
        assert_eq!(display_width(""), 0);
    }

    // ── truncate_to_width ──────────────────────────────────────────

    #[test]
    fn truncate_no_truncation_needed() {
        assert_eq!(truncate_to_width("장보기", 10), "장보기");
    }

    #[test]
    fn truncate_hangul_boundary() {
        // "보고서 작성" is 11 cells; 6 cells leave room for two syllables and '…'
        assert_eq!(truncate_to_width("보고서 작성", 6), "보고\u{2026}");
    }

    #[test]
    fn truncate_hangul_off_by_one() {
        let result = truncate_to_width("보고서 작성", 4);
        assert!(display_width(&result) <= 4);
        assert!(result.ends_with('\u{2026}'));
    }

    #[test]
    fn truncate_zero_and_one() {
        assert_eq!(truncate_to_width("hello", 0), "");
        assert_eq!(truncate_to_width("hello", 1), "\u{2026}");
    }

    // ── pad_to_width ───────────────────────────────────────────────

    #[test]
    fn pad_short_and_long() {
        assert_eq!(pad_to_width("운동", 6), "운동  ");
        assert_eq!(display_width(&pad_to_width("매우 긴 프로젝트 이름", 8)), 8);
        // odd widths cannot split a double-width syllable
        assert_eq!(pad_to_width("보고서", 4), "보\u{2026} ");
    }
}
