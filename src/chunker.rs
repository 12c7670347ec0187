//! Content chunking for oversized memory payloads.
//!
//! Splits a string into ordered, overlapping chunks along preferred semantic
//! boundaries so each piece can be created as an independent memory record.

use serde_json::{Value, json};

/// Boundary patterns, strongest first. The splitter walks this list and
/// takes the first kind that yields a valid split inside the search window.
const BOUNDARIES: &[&str] = &["\n\n\n", "\n\n", "\n", ". ", "! ", "? ", "; ", ", ", " "];

/// Hard cap on splitter iterations. Hitting it switches to forced splits.
const MAX_ITERATIONS: usize = 1_000;

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 8_000;
pub const DEFAULT_OVERLAP_SIZE: usize = 200;
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    pub max_chunk_size: usize,
    pub overlap_size: usize,
    pub min_chunk_size: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            overlap_size: DEFAULT_OVERLAP_SIZE,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    /// 1-based position in the sequence.
    pub index: usize,
    pub total: usize,
    pub content: String,
    /// Absolute byte offsets into the original content.
    pub start: usize,
    pub end: usize,
    pub is_continuation: bool,
}

/// How the chunk ends were chosen, reported in the result metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMethod {
    None,
    Boundary,
    Forced,
}

impl SplitMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Boundary => "boundary",
            Self::Forced => "forced",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub chunks: Vec<Chunk>,
    pub split_method: SplitMethod,
}

pub fn needs_chunking(content: &str, max_chunk_size: usize) -> bool {
    content.len() > max_chunk_size
}

/// Upper-bound estimate of the number of chunks produced for `len` bytes.
pub fn estimate_chunk_count(len: usize, max_chunk_size: usize) -> usize {
    let effective = (max_chunk_size as f64 * 0.9).max(1.0);
    (len as f64 / effective).ceil() as usize
}

/// Split `content` per the configured window search. Guarantees:
/// concatenating the non-overlapping regions reproduces the original, every
/// non-final chunk is at least `min_chunk_size`, and consecutive starts
/// advance by at least `min_chunk_size`.
pub fn split(content: &str, options: &ChunkOptions) -> ChunkResult {
    let len = content.len();
    if len <= options.max_chunk_size {
        return ChunkResult {
            chunks: vec![Chunk {
                index: 1,
                total: 1,
                content: content.to_string(),
                start: 0,
                end: len,
                is_continuation: false,
            }],
            split_method: SplitMethod::None,
        };
    }

    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut split_method = SplitMethod::Boundary;
    let mut start = 0usize;
    let mut iterations = 0usize;

    while start < len {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            split_method = SplitMethod::Forced;
            spans.push((start, len));
            break;
        }

        let target_end = (start + options.max_chunk_size).min(len);
        if target_end == len {
            spans.push((start, len));
            break;
        }

        let end = match boundary_in_window(content, start, target_end, options) {
            Some(at) => at,
            None => {
                split_method = SplitMethod::Forced;
                floor_char_boundary(content, target_end)
            }
        };

        spans.push((start, end));

        let next = (start + options.min_chunk_size).max(end.saturating_sub(options.overlap_size));
        start = floor_char_boundary(content, next.min(len));
        if start >= len {
            break;
        }
    }

    let total = spans.len();
    let chunks = spans
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| Chunk {
            index: i + 1,
            total,
            content: content[start..end].to_string(),
            start,
            end,
            is_continuation: i > 0,
        })
        .collect();

    ChunkResult {
        chunks,
        split_method,
    }
}

/// Search `[target_end - overlap, target_end + overlap]` for the strongest
/// boundary producing a chunk of at least `min_chunk_size`. The scan runs
/// backwards from the window end so the match closest to the target wins.
fn boundary_in_window(
    content: &str,
    start: usize,
    target_end: usize,
    options: &ChunkOptions,
) -> Option<usize> {
    let window_start = target_end
        .saturating_sub(options.overlap_size)
        .max(start + options.min_chunk_size);
    let window_end = (target_end + options.overlap_size).min(content.len());
    if window_start >= window_end {
        return None;
    }
    let window_start = ceil_char_boundary(content, window_start);
    let window_end = floor_char_boundary(content, window_end);
    let window = &content[window_start..window_end];

    for boundary in BOUNDARIES {
        if let Some(pos) = window.rfind(boundary) {
            let end = window_start + pos + boundary.len();
            if end - start >= options.min_chunk_size && end < content.len() {
                return Some(end);
            }
        }
    }
    None
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

// ── Memory payload assembly ─────────────────────────────────────────────

/// Build the memory-creation payloads for `content`, one per chunk.
///
/// Multi-chunk payloads get a " (Part i of N)" title suffix, `chunked` and
/// `chunk-i-of-N` tags, and a `chunk_info` metadata block recording the
/// split.
pub fn build_chunked_payloads(
    base_title: &str,
    content: &str,
    memory_type: &str,
    tags: &[String],
    metadata: &Value,
    options: &ChunkOptions,
) -> (Vec<Value>, ChunkResult) {
    let result = split(content, options);
    let total = result.chunks.len();

    let payloads = result
        .chunks
        .iter()
        .map(|chunk| {
            let title = if total == 1 {
                base_title.to_string()
            } else {
                format!("{base_title} (Part {} of {})", chunk.index, chunk.total)
            };

            let mut chunk_tags: Vec<String> = tags.to_vec();
            if total > 1 {
                chunk_tags.push("chunked".to_string());
                chunk_tags.push(format!("chunk-{}-of-{}", chunk.index, chunk.total));
            }

            let mut meta = match metadata {
                Value::Object(map) => map.clone(),
                _ => serde_json::Map::new(),
            };
            if total > 1 {
                meta.insert(
                    "chunk_info".to_string(),
                    json!({
                        "index": chunk.index,
                        "total": chunk.total,
                        "original_length": content.len(),
                        "start_offset": chunk.start,
                        "end_offset": chunk.end,
                        "is_continuation": chunk.is_continuation,
                        "split_method": result.split_method.as_str(),
                    }),
                );
            }

            json!({
                "title": title,
                "content": chunk.content,
                "memory_type": memory_type,
                "tags": chunk_tags,
                "metadata": Value::Object(meta),
            })
        })
        .collect();

    (payloads, result)
}

/// Reassemble chunks (sorted by index) with a visible separator. Overlap
/// regions appear twice at the seams; the non-overlap content is intact.
pub fn reassemble(chunks: &mut [Chunk]) -> String {
    chunks.sort_by_key(|c| c.index);
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(max: usize, overlap: usize, min: usize) -> ChunkOptions {
        ChunkOptions {
            max_chunk_size: max,
            overlap_size: overlap,
            min_chunk_size: min,
        }
    }

    fn paragraphs(count: usize, width: usize) -> String {
        (0..count)
            .map(|i| format!("paragraph {i} {}", "x".repeat(width)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn content_at_exactly_max_size_does_not_chunk() {
        let content = "a".repeat(1_000);
        let result = split(&content, &options(1_000, 100, 50));
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.split_method, SplitMethod::None);
        assert_eq!(result.chunks[0].content, content);
    }

    #[test]
    fn chunks_cover_the_full_input() {
        let content = paragraphs(60, 150);
        let opts = options(2_000, 100, 300);
        let result = split(&content, &opts);
        assert!(result.chunks.len() > 1);

        // Coverage: each next start falls inside or at the previous span.
        assert_eq!(result.chunks[0].start, 0);
        assert_eq!(result.chunks.last().unwrap().end, content.len());
        for pair in result.chunks.windows(2) {
            assert!(pair[1].start <= pair[0].end, "gap between chunks");
            assert!(pair[1].start > pair[0].start, "no forward progress");
        }

        // Every chunk's content matches its recorded offsets.
        for chunk in &result.chunks {
            assert_eq!(chunk.content, &content[chunk.start..chunk.end]);
        }
    }

    #[test]
    fn non_final_chunks_respect_min_size() {
        let content = paragraphs(60, 150);
        let opts = options(2_000, 100, 300);
        let result = split(&content, &opts);
        for chunk in &result.chunks[..result.chunks.len() - 1] {
            assert!(chunk.content.len() >= opts.min_chunk_size);
        }
    }

    #[test]
    fn chunk_count_is_bounded() {
        let content = "word ".repeat(5_000); // 25,000 bytes
        let opts = options(8_000, 200, 500);
        let result = split(&content, &opts);
        let bound = content.len().div_ceil(opts.max_chunk_size - opts.overlap_size) + 1;
        assert!(result.chunks.len() <= bound);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let content = paragraphs(30, 200);
        let result = split(&content, &options(2_000, 150, 300));
        assert_eq!(result.split_method, SplitMethod::Boundary);
        // Interior chunks should end right after a paragraph break.
        let interior = &result.chunks[..result.chunks.len() - 1];
        assert!(interior.iter().any(|c| c.content.ends_with("\n\n")));
    }

    #[test]
    fn forced_split_when_no_boundary_exists() {
        let content = "x".repeat(10_000);
        let result = split(&content, &options(2_000, 100, 500));
        assert_eq!(result.split_method, SplitMethod::Forced);
        assert_eq!(result.chunks.last().unwrap().end, content.len());
    }

    #[test]
    fn multibyte_content_splits_on_char_boundaries() {
        let content = "héllo wörld. ".repeat(1_000);
        let result = split(&content, &options(2_000, 100, 300));
        for chunk in &result.chunks {
            assert!(content.is_char_boundary(chunk.start));
            assert!(content.is_char_boundary(chunk.end));
        }
    }

    #[test]
    fn estimate_matches_formula() {
        assert_eq!(estimate_chunk_count(25_000, 8_000), 4);
        assert_eq!(estimate_chunk_count(100, 8_000), 1);
        assert_eq!(estimate_chunk_count(0, 8_000), 0);
    }

    #[test]
    fn payloads_carry_part_titles_and_tags() {
        let content = paragraphs(60, 150);
        let (payloads, result) = build_chunked_payloads(
            "Design notes",
            &content,
            "knowledge",
            &["docs".to_string()],
            &json!({"source": "import"}),
            &options(2_000, 100, 300),
        );
        let total = result.chunks.len();
        assert!(total > 1);
        assert_eq!(payloads.len(), total);

        for (i, payload) in payloads.iter().enumerate() {
            let n = i + 1;
            assert_eq!(
                payload["title"],
                format!("Design notes (Part {n} of {total})")
            );
            let tags: Vec<&str> = payload["tags"]
                .as_array()
                .unwrap()
                .iter()
                .map(|t| t.as_str().unwrap())
                .collect();
            assert!(tags.contains(&"docs"));
            assert!(tags.contains(&"chunked"));
            assert!(tags.contains(&format!("chunk-{n}-of-{total}").as_str()));
            assert_eq!(payload["metadata"]["source"], "import");
            assert_eq!(payload["metadata"]["chunk_info"]["index"], n);
            assert_eq!(
                payload["metadata"]["chunk_info"]["original_length"],
                content.len()
            );
        }
    }

    #[test]
    fn small_content_yields_one_untouched_payload() {
        let (payloads, result) = build_chunked_payloads(
            "Note",
            "short content",
            "context",
            &[],
            &Value::Null,
            &ChunkOptions::default(),
        );
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(payloads[0]["title"], "Note");
        assert_eq!(payloads[0]["tags"], json!([]));
        assert!(payloads[0]["metadata"].get("chunk_info").is_none());
    }

    #[test]
    fn reassemble_orders_by_index() {
        let content = paragraphs(60, 150);
        let result = split(&content, &options(2_000, 100, 300));
        let mut shuffled = result.chunks.clone();
        shuffled.reverse();
        let joined = reassemble(&mut shuffled);
        assert!(joined.starts_with("paragraph 0"));
        assert!(joined.contains("---"));
    }
}
