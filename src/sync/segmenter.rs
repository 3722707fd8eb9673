//! Markdown segmentation for indexing.

use std::path::Path;

/// Chunk of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk index within the document (0-based, dense).
    pub index: usize,
    /// Chunk text.
    pub text: String,
}

/// Segmentation configuration.
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// Maximum chunk size in characters.
    pub max_chars: usize,
    /// Chunks whose trimmed length is at or below this are dropped.
    pub min_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chars: 800,
            min_chars: 30,
        }
    }
}

/// Heading-aware Markdown segmenter.
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    /// Create a new segmenter with config.
    #[must_use]
    pub const fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Create a segmenter with default config.
    #[must_use]
    pub fn default_segmenter() -> Self {
        Self::new(SegmenterConfig::default())
    }

    /// Get the segmenter configuration.
    #[must_use]
    pub const fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Split document text into chunks.
    ///
    /// Sections start at every level 1-3 heading. Sections that fit are kept
    /// whole; longer ones are packed paragraph by paragraph. Empty input
    /// yields no chunks.
    #[must_use]
    pub fn segment(&self, text: &str) -> Vec<Chunk> {
        let mut pieces = Vec::new();

        for section in split_sections(text) {
            let section = section.trim();
            if section.is_empty() {
                continue;
            }

            if char_len(section) <= self.config.max_chars {
                pieces.push(section.to_string());
            } else {
                self.pack_paragraphs(section, &mut pieces);
            }
        }

        pieces
            .into_iter()
            .filter(|p| char_len(p.trim()) > self.config.min_chars)
            .enumerate()
            .map(|(index, text)| Chunk { index, text })
            .collect()
    }

    /// Greedily accumulate blank-line separated paragraphs into chunks.
    fn pack_paragraphs(&self, section: &str, out: &mut Vec<String>) {
        let mut current = String::new();
        let mut current_len = 0;

        for para in section.split("\n\n").map(str::trim) {
            if para.is_empty() {
                continue;
            }
            let para_len = char_len(para);

            if current.is_empty() {
                current.push_str(para);
                current_len = para_len;
            } else if current_len + para_len + 2 > self.config.max_chars {
                out.push(std::mem::take(&mut current));
                current.push_str(para);
                current_len = para_len;
            } else {
                current.push_str("\n\n");
                current.push_str(para);
                current_len += para_len + 2;
            }
        }

        if !current.is_empty() {
            out.push(current);
        }
    }
}

/// Split text before every level 1-3 heading line.
fn split_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if offset > start && is_section_heading(line) {
            sections.push(&text[start..offset]);
            start = offset;
        }
        offset += line.len();
    }

    sections.push(&text[start..]);
    sections
}

/// A heading line is 1-3 `#` followed by whitespace.
fn is_section_heading(line: &str) -> bool {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    (1..=3).contains(&hashes)
        && line[hashes..]
            .chars()
            .next()
            .is_some_and(char::is_whitespace)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Derive a document title.
///
/// Uses the text of a `# ` heading at the very start of the document,
/// falling back to the file name without its extension. The whitespace after
/// `#` may span lines.
#[must_use]
pub fn extract_title(text: &str, file_name: &str) -> String {
    let heading = text
        .strip_prefix('#')
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .and_then(|rest| rest.trim_start().lines().next())
        .map(str::trim)
        .filter(|title| !title.is_empty());

    if let Some(title) = heading {
        return title.to_string();
    }

    Path::new(file_name)
        .file_stem()
        .map_or_else(|| file_name.to_string(), |s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter(max_chars: usize) -> Segmenter {
        Segmenter::new(SegmenterConfig {
            max_chars,
            min_chars: 30,
        })
    }

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_short_document_single_chunk() {
        let body = "This paragraph has exactly enough words to pass.";
        let content = format!("# Groceries\n\n{body}\n");

        let chunks = Segmenter::default_segmenter().segment(&content);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, format!("# Groceries\n\n{body}"));
    }

    #[test]
    fn test_empty_and_whitespace_documents() {
        let seg = Segmenter::default_segmenter();
        assert!(seg.segment("").is_empty());
        assert!(seg.segment("   \n\n\t\n").is_empty());
    }

    #[test]
    fn test_splits_on_heading_levels_one_to_three() {
        let content = "\
# Top level heading with a body long enough
## Second level heading with a body long enough
### Third level heading with a body long enough
#### Fourth level stays attached to the third section
";
        let chunks = segmenter(800).segment(content);

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].text.starts_with("# Top"));
        assert!(chunks[1].text.starts_with("## Second"));
        assert!(chunks[2].text.starts_with("### Third"));
        assert!(chunks[2].text.contains("#### Fourth"));
    }

    #[test]
    fn test_tags_do_not_split() {
        let content = "Some introduction text that is long enough.\n#tag on its own line here\n";
        let chunks = segmenter(800).segment(content);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("#tag"));
    }

    #[test]
    fn test_heading_only_sections_are_noise() {
        let content = "# Title\n## Empty\n## Real section with enough body text to keep\n";
        let chunks = segmenter(800).segment(content);

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.starts_with("## Real"));
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_long_section_packs_paragraphs() {
        let para = "a".repeat(40);
        let content = [para.as_str(); 5].join("\n\n");

        // 40 + 2 + 40 = 82 fits in 100, a third paragraph does not.
        let chunks = segmenter(100).segment(&content);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, format!("{para}\n\n{para}"));
        assert_eq!(chunks[1].text, format!("{para}\n\n{para}"));
        assert_eq!(chunks[2].text, para);
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_oversize_paragraph_kept_whole() {
        let big = "b".repeat(150);
        let small = "c".repeat(40);
        let content = format!("{small}\n\n{big}\n\n{small}");

        let chunks = segmenter(100).segment(&content);

        assert_eq!(texts(&chunks), vec![small.as_str(), big.as_str(), small.as_str()]);
    }

    #[test]
    fn test_extra_blank_lines_collapse() {
        let para = "d".repeat(60);
        let content = format!("{para}\n\n\n\n{para}");

        let chunks = segmenter(100).segment(&content);

        assert_eq!(texts(&chunks), vec![para.as_str(), para.as_str()]);
    }

    #[test]
    fn test_lengths_count_characters_not_bytes() {
        // 50 two-byte characters: 100 bytes but only 50 characters.
        let para = "é".repeat(50);
        let chunks = segmenter(60).segment(&para);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_min_chars_boundary() {
        let exactly = "x".repeat(30);
        let one_more = "y".repeat(31);
        let content = format!("# {exactly}\n\n## {one_more}");

        // "# " prefix makes the first section 32 characters.
        let chunks = segmenter(800).segment(&content);
        assert_eq!(chunks.len(), 2);

        let chunks = segmenter(800).segment(&exactly);
        assert!(chunks.is_empty());
        let chunks = segmenter(800).segment(&one_more);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_deterministic() {
        let content = "# A\n\nfirst paragraph of reasonable length here\n\n## B\n\nsecond paragraph of reasonable length\n";
        let seg = segmenter(50);
        assert_eq!(seg.segment(content), seg.segment(content));
    }

    #[test]
    fn test_extract_title_from_heading() {
        assert_eq!(extract_title("# My Note\n\nbody", "my-note.md"), "My Note");
        assert_eq!(extract_title("#   Spaced  \nbody", "x.md"), "Spaced");
        assert_eq!(extract_title("#\n\nTitle below\nbody", "x.md"), "Title below");
    }

    #[test]
    fn test_extract_title_requires_heading_at_start() {
        assert_eq!(extract_title("\n\n# Late\nbody", "x.md"), "x");
        assert_eq!(extract_title("  # Indented", "y.md"), "y");
        assert_eq!(extract_title("intro\n# Later", "z.md"), "z");
    }

    #[test]
    fn test_extract_title_fallback() {
        assert_eq!(extract_title("no heading here", "Daily Log.md"), "Daily Log");
        assert_eq!(extract_title("## Second level", "plan.md"), "plan");
        assert_eq!(extract_title("#tag first", "tagged.md"), "tagged");
        assert_eq!(extract_title("", "v1.2.md"), "v1.2");
    }

    #[test]
    fn test_is_section_heading() {
        assert!(is_section_heading("# A\n"));
        assert!(is_section_heading("### C"));
        assert!(is_section_heading("##\n"));
        assert!(!is_section_heading("#### D"));
        assert!(!is_section_heading("#tag"));
        assert!(!is_section_heading("text # not heading"));
    }
}
