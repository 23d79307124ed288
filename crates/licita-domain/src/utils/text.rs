//! Shared text-normalization helpers used by adapters, the chunker and the
//! hybrid search keyword matcher.

use unicode_normalization::UnicodeNormalization;

/// Lowercases, strips accents, replaces punctuation with spaces and
/// collapses whitespace — the normalization the REST adapter applies to
/// both the filter keyword and the haystack fields before substring
/// matching (spec §4.1).
#[must_use]
pub fn normalize(input: &str) -> String {
    let decomposed: String = input.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let mut out = String::with_capacity(decomposed.len());
    let mut last_was_space = false;
    for ch in decomposed.chars() {
        let mapped = if ch.is_alphanumeric() {
            ch.to_ascii_lowercase()
        } else {
            ' '
        };
        if mapped == ' ' {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(mapped);
            last_was_space = false;
        }
    }
    out.trim_end().to_owned()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

/// Extracts the `N` integers from `--- PAGE N ---` markers in extraction
/// order (duplicates removed, original order preserved).
#[must_use]
pub fn extract_page_markers(text: &str) -> Vec<u32> {
    let mut pages = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed
            .strip_prefix("--- PAGE ")
            .and_then(|r| r.strip_suffix(" ---"))
        {
            if let Ok(n) = rest.trim().parse::<u32>() {
                if !pages.contains(&n) {
                    pages.push(n);
                }
            }
        }
    }
    pages
}

/// Splits the page-marked text into `(page_number, page_text)` pairs (spec
/// §4.9 step 1). Text before the first marker (if any) is attributed to
/// page 1.
#[must_use]
pub fn split_by_page(text: &str) -> Vec<(u32, String)> {
    let mut pages = Vec::new();
    let mut current_page = 1u32;
    let mut current_text = String::new();
    let mut started = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(n) = trimmed
            .strip_prefix("--- PAGE ")
            .and_then(|r| r.strip_suffix(" ---"))
            .and_then(|r| r.trim().parse::<u32>().ok())
        {
            if started || !current_text.trim().is_empty() {
                pages.push((current_page, std::mem::take(&mut current_text)));
            }
            current_page = n;
            started = true;
            continue;
        }
        current_text.push_str(line);
        current_text.push('\n');
    }
    if !current_text.trim().is_empty() || !started {
        pages.push((current_page, current_text));
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize("Notebook Intel i5!"), "notebook intel i5");
        assert_eq!(normalize("computador portátil"), "computador portatil");
        assert_eq!(normalize("  múltiplos   espaços  "), "multiplos espacos");
    }

    #[test]
    fn page_markers_extracted_in_order() {
        let text = "intro\n--- PAGE 1 ---\nhello\n--- PAGE 2 ---\nworld";
        assert_eq!(extract_page_markers(text), vec![1, 2]);
    }

    #[test]
    fn split_by_page_groups_lines() {
        let text = "--- PAGE 1 ---\nhello\nworld\n--- PAGE 2 ---\nfoo";
        let pages = split_by_page(text);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].0, 1);
        assert!(pages[0].1.contains("hello"));
        assert_eq!(pages[1].0, 2);
        assert!(pages[1].1.contains("foo"));
    }
}
