//! Chunk-splitting heuristic (§4.7): greedily accumulate paragraphs into
//! 500-1500 char chunks, hard-splitting an oversized single paragraph on
//! whitespace. No overlap between chunks.

const MIN_CHUNK_CHARS: usize = 500;
const MAX_CHUNK_CHARS: usize = 1500;

pub fn chunk_text(text: &str) -> Vec<String> {
    let paragraphs = split_paragraphs(text);
    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for paragraph in paragraphs {
        for piece in split_oversized(&paragraph) {
            if !buffer.is_empty() && buffer.chars().count() >= MIN_CHUNK_CHARS
                && buffer.chars().count() + piece.chars().count() + 2 > MAX_CHUNK_CHARS
            {
                chunks.push(std::mem::take(&mut buffer));
            }
            if !buffer.is_empty() {
                buffer.push_str("\n\n");
            }
            buffer.push_str(&piece);
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }

    chunks
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let re_split = text.split("\n\n");
    re_split
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Hard-splits a paragraph longer than [`MAX_CHUNK_CHARS`] at the nearest
/// preceding whitespace boundary before the limit, never mid-word.
fn split_oversized(paragraph: &str) -> Vec<String> {
    if paragraph.chars().count() <= MAX_CHUNK_CHARS {
        return vec![paragraph.to_string()];
    }

    let chars: Vec<char> = paragraph.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let remaining = chars.len() - start;
        if remaining <= MAX_CHUNK_CHARS {
            pieces.push(chars[start..].iter().collect::<String>().trim().to_string());
            break;
        }

        let mut split_at = start + MAX_CHUNK_CHARS;
        while split_at > start && !chars[split_at].is_whitespace() {
            split_at -= 1;
        }
        if split_at == start {
            // No whitespace found in range: fall back to a hard cut.
            split_at = start + MAX_CHUNK_CHARS;
        }

        pieces.push(chars[start..split_at].iter().collect::<String>().trim().to_string());
        start = split_at;
    }

    pieces.into_iter().filter(|p| !p.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_becomes_a_single_chunk() {
        let text = "a".repeat(100);
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn accumulates_paragraphs_until_min_threshold_before_closing() {
        let para = "word ".repeat(20); // ~100 chars
        let text = vec![para.clone(); 10].join("\n\n"); // ~1000 chars total
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].chars().count() >= MIN_CHUNK_CHARS);
    }

    #[test]
    fn closes_chunk_once_max_would_be_exceeded() {
        let para = "x".repeat(600);
        let text = vec![para.clone(), para.clone(), para].join("\n\n");
        let chunks = chunk_text(&text);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= MAX_CHUNK_CHARS + 4);
        }
    }

    #[test]
    fn oversized_single_paragraph_hard_splits_on_whitespace() {
        let paragraph = "word ".repeat(400); // ~2000 chars, one paragraph
        let chunks = chunk_text(&paragraph);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(!chunk.starts_with(' '));
            assert!(chunk.chars().count() <= MAX_CHUNK_CHARS);
        }
    }

    #[test]
    fn no_overlap_between_chunks() {
        let para = "x".repeat(600);
        let text = vec![para.clone(), para.clone(), para].join("\n\n");
        let chunks = chunk_text(&text);
        let rejoined: String = chunks.join("");
        assert_eq!(rejoined.chars().filter(|c| *c == 'x').count(), 1800);
    }
}
