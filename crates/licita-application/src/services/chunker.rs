//! Structure-aware, overlapping text chunker (spec C9 / §4.9).
//!
//! Pure function over already-extracted text; no I/O. Input text is
//! expected to carry `--- PAGE N ---` markers, as produced by the
//! extraction engines (C8) and recovered with
//! [`licita_domain::utils::text::split_by_page`].

use licita_domain::constants::{
    DEFAULT_CHUNK_OVERLAP_CHARS, DEFAULT_CHUNK_SIZE_CHARS, DEFAULT_MIN_CHUNK_SIZE_CHARS,
};
use licita_domain::utils::text::split_by_page;
use licita_domain::value_objects::ChunkType;

/// One section of classified lines before it is split into target-sized
/// chunks.
struct Section {
    page_number: u32,
    chunk_type: ChunkType,
    title: Option<String>,
    lines: Vec<String>,
}

/// A chunk before persistence: no id/document linkage yet, those are
/// assigned by the caller (the document pipeline, which knows the
/// document and opportunity ids).
#[derive(Debug, Clone)]
pub struct DraftChunk {
    pub text: String,
    pub chunk_type: ChunkType,
    pub page_number: u32,
    pub section_title: Option<String>,
    pub token_count: usize,
    pub char_count: usize,
    pub has_overlap: bool,
}

/// Runs the full pipeline: page split → line classification → section
/// grouping → size-bounded splitting → overlap → minimum-size filter.
pub fn chunk_text(full_text: &str) -> Vec<DraftChunk> {
    let pages = split_by_page(full_text);
    let sections = pages
        .into_iter()
        .flat_map(|(page_number, page_text)| classify_into_sections(page_number, &page_text))
        .collect::<Vec<_>>();

    let mut chunks = Vec::new();
    for section in &sections {
        chunks.extend(split_section(section));
    }

    apply_overlap(&mut chunks);
    chunks.retain(|c| c.char_count >= DEFAULT_MIN_CHUNK_SIZE_CHARS);
    chunks
}

/// Classifies each non-empty line of one page and groups consecutive
/// compatible lines into sections (spec step 2-3).
fn classify_into_sections(page_number: u32, page_text: &str) -> Vec<Section> {
    const MAX_SECTION_CHARS: usize = 4000;

    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<Section> = None;
    let mut current_len = 0usize;

    for raw_line in page_text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let line_type = classify_line(line);
        let starts_new_section = matches!(line_type, ChunkType::Title | ChunkType::Subtitle)
            || current_len + line.len() > MAX_SECTION_CHARS;

        if starts_new_section || current.is_none() {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            let title = matches!(line_type, ChunkType::Title | ChunkType::Subtitle)
                .then(|| line.to_string());
            current = Some(Section {
                page_number,
                chunk_type: line_type,
                title,
                lines: vec![line.to_string()],
            });
            current_len = line.len();
        } else if let Some(section) = current.as_mut() {
            section.lines.push(line.to_string());
            current_len += line.len();
        }
    }
    if let Some(section) = current.take() {
        sections.push(section);
    }
    sections
}

fn classify_line(line: &str) -> ChunkType {
    if is_table_like(line) {
        ChunkType::Table
    } else if is_list_like(line) {
        ChunkType::List
    } else if is_title_like(line) {
        ChunkType::Title
    } else if is_subtitle_like(line) {
        ChunkType::Subtitle
    } else {
        ChunkType::Paragraph
    }
}

fn is_title_like(line: &str) -> bool {
    let short_enough = line.chars().count() <= 80;
    let is_upper = line.chars().any(char::is_alphabetic)
        && line
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(|c| c.is_uppercase());
    let is_numbered = line
        .split_whitespace()
        .next()
        .map(|first| first.trim_end_matches('.').chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    short_enough && (is_upper || is_numbered)
}

fn is_subtitle_like(line: &str) -> bool {
    line.ends_with(':')
        || line
            .split('.')
            .next()
            .map(|first| !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false) && line.contains('.')
}

fn is_list_like(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("- ")
        || trimmed.starts_with("• ")
        || trimmed.starts_with("* ")
        || starts_with_enumerator(trimmed)
}

fn starts_with_enumerator(s: &str) -> bool {
    let Some((head, rest)) = s.split_once(|c: char| c == ')' || c == '.') else {
        return false;
    };
    !head.is_empty()
        && head.chars().all(|c| c.is_ascii_alphanumeric())
        && rest.starts_with(' ')
}

fn is_table_like(line: &str) -> bool {
    let multi_space = line.matches("   ").count() >= 2;
    let tabs = line.matches('\t').count() >= 2;
    let colons = line.matches(':').count() >= 2;
    multi_space || tabs || colons
}

/// Splits one section into target-sized chunks (spec step 4). Sections
/// short enough emit as a single chunk.
fn split_section(section: &Section) -> Vec<DraftChunk> {
    let text = section.lines.join("\n");
    if text.len() <= DEFAULT_CHUNK_SIZE_CHARS {
        return vec![make_chunk(section, text)];
    }

    let sentences = split_sentences(&text);
    let mut chunks = Vec::new();
    let mut current = String::new();
    for sentence in sentences {
        if !current.is_empty() && current.len() + sentence.len() > DEFAULT_CHUNK_SIZE_CHARS {
            chunks.push(make_chunk(section, std::mem::take(&mut current)));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }
    if !current.is_empty() {
        chunks.push(make_chunk(section, current));
    }
    chunks
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let next_is_space = chars.peek().is_some_and(|n| n.is_whitespace());
            if next_is_space || chars.peek().is_none() {
                sentences.push(current.trim().to_string());
                current.clear();
            }
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }
    sentences
}

fn make_chunk(section: &Section, text: String) -> DraftChunk {
    let char_count = text.chars().count();
    DraftChunk {
        token_count: char_count / 4,
        char_count,
        text,
        chunk_type: section.chunk_type,
        page_number: section.page_number,
        section_title: section.title.clone(),
        has_overlap: false,
    }
}

/// Prepends the last `DEFAULT_CHUNK_OVERLAP_CHARS` characters of each
/// chunk's predecessor to the next chunk (spec step 5).
fn apply_overlap(chunks: &mut [DraftChunk]) {
    for i in (1..chunks.len()).rev() {
        let tail: String = chunks[i - 1]
            .text
            .chars()
            .rev()
            .take(DEFAULT_CHUNK_OVERLAP_CHARS)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if tail.is_empty() {
            continue;
        }
        chunks[i].text = format!("{tail} {}", chunks[i].text);
        chunks[i].char_count = chunks[i].text.chars().count();
        chunks[i].token_count = chunks[i].char_count / 4;
        chunks[i].has_overlap = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_title_and_paragraph_lines() {
        assert_eq!(classify_line("TERMO DE REFERÊNCIA"), ChunkType::Title);
        assert_eq!(classify_line("1. Objeto:"), ChunkType::Subtitle);
        assert_eq!(classify_line("- item do edital"), ChunkType::List);
        assert_eq!(
            classify_line("Este é um parágrafo comum de texto corrido."),
            ChunkType::Paragraph
        );
    }

    #[test]
    fn drops_chunks_under_minimum_size() {
        let text = "--- PAGE 1 ---\nabc\n";
        let chunks = chunk_text(text);
        assert!(chunks.is_empty());
    }

    #[test]
    fn page_numbers_are_preserved() {
        let long_paragraph = "Fornecimento de material de escritório diversos. ".repeat(10);
        let text = format!("--- PAGE 1 ---\n{long_paragraph}\n--- PAGE 2 ---\n{long_paragraph}\n");
        let chunks = chunk_text(&text);
        let pages: std::collections::HashSet<u32> = chunks.iter().map(|c| c.page_number).collect();
        assert!(pages.contains(&1));
        assert!(pages.contains(&2));
    }

    #[test]
    fn char_count_matches_chunk_text_length() {
        let long_paragraph = "Texto longo de exemplo para compor um chunk. ".repeat(20);
        let text = format!("--- PAGE 1 ---\n{long_paragraph}\n");
        let chunks = chunk_text(&text);
        for chunk in &chunks {
            assert_eq!(chunk.char_count, chunk.text.chars().count());
        }
    }

    #[test]
    fn second_chunk_carries_overlap_from_predecessor() {
        let long_paragraph = "Fragmento repetido de texto para forçar divisão em múltiplos blocos. ".repeat(80);
        let text = format!("--- PAGE 1 ---\n{long_paragraph}\n");
        let chunks = chunk_text(&text);
        assert!(chunks.len() >= 2, "expected the long paragraph to split into multiple chunks");
        assert!(chunks[1].has_overlap);
        assert!(!chunks[0].has_overlap);
    }
}
