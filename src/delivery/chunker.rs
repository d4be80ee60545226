//! Word-boundary splitting of long texts into transport-sized parts.
//!
//! Lengths are counted in `char`s, which is how the transport measures message bodies.
//! Whitespace runs collapse to a single space at every boundary, so joining the parts
//! with `' '` gives back the input with its whitespace normalized.

use tracing::debug;

/// Splits `text` into ordered parts of at most `max_part_length` characters.
///
/// Words are packed greedily. A word longer than the limit is hard-split at character
/// boundaries: each full-size piece becomes its own part and the trailing piece opens
/// the next part. Empty input yields a single empty part, and a limit of zero is
/// treated as one.
pub fn split(text: &str, max_part_length: usize) -> Vec<String> {
    let max = max_part_length.max(1);

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len <= max {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
            continue;
        }

        if current_len > 0 {
            parts.push(std::mem::take(&mut current));
        }

        if word_len <= max {
            current.push_str(word);
            current_len = word_len;
            continue;
        }

        debug!(word_len, max, "Hard-splitting a word longer than the part limit.");

        let mut pieces = hard_split(word, max);
        let tail = pieces.pop().unwrap_or_default();
        parts.extend(pieces);
        current_len = tail.chars().count();
        current = tail;
    }

    if current_len > 0 || parts.is_empty() {
        parts.push(current);
    }

    parts
}

/// Cuts `word` into consecutive pieces of `max` characters (the last may be shorter).
fn hard_split(word: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.chunks(max).map(|piece| piece.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn prose(target_len: usize) -> String {
        let words = ["lorem", "ipsum", "dolor", "sit", "amet,", "consectetur", "adipiscing", "elit."];
        let mut out = String::new();
        let mut i = 0;
        while out.len() < target_len {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(words[i % words.len()]);
            i += 1;
        }
        out.truncate(target_len);
        out.trim_end().to_string()
    }

    #[test]
    fn short_text_is_one_part() {
        assert_eq!(split("hello world", 100), vec!["hello world"]);
    }

    #[test]
    fn empty_text_is_one_empty_part() {
        assert_eq!(split("", 10), vec![String::new()]);
        assert_eq!(split("  \n\t ", 10), vec![String::new()]);
    }

    #[test]
    fn packs_words_greedily() {
        let parts = split("aaa bbb ccc ddd", 7);
        assert_eq!(parts, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn exact_fit_includes_separator() {
        // "ab cd" is 5 characters, so it fits a limit of 5 but not 4.
        assert_eq!(split("ab cd", 5), vec!["ab cd"]);
        assert_eq!(split("ab cd", 4), vec!["ab", "cd"]);
    }

    #[test]
    fn oversized_word_is_hard_split_and_tail_continues() {
        let parts = split("xx abcdefghij yy", 4);
        assert_eq!(parts, vec!["xx", "abcd", "efgh", "ij", "yy"]);

        let parts = split("abcdefghij k", 4);
        assert_eq!(parts, vec!["abcd", "efgh", "ij k"]);
    }

    #[test]
    fn hard_split_respects_char_boundaries() {
        let word = "说".repeat(10);
        let parts = split(&word, 4);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.chars().count() <= 4));
        assert_eq!(parts.concat(), word);
    }

    #[test]
    fn zero_limit_behaves_as_one() {
        assert_eq!(split("ab c", 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn parts_rejoin_to_normalized_input() {
        let text = "The  quick brown\nfox jumps\tover the lazy dog ".repeat(40);
        // Every limit here is at least as long as the longest word, so no hard splits.
        for max in [5, 10, 57, 200, 5000] {
            let parts = split(&text, max);
            assert_eq!(parts.join(" "), normalized(&text), "max = {max}");
            assert!(parts.iter().all(|p| p.chars().count() <= max), "max = {max}");
            assert!(parts.iter().all(|p| !p.is_empty()), "max = {max}");
        }
    }

    #[test]
    fn prose_of_3400_chars_splits_into_three_parts() {
        let text = prose(3400);
        let parts = split(&text, 1500);

        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.chars().count() <= 1500));
        assert_eq!(parts.join(" "), normalized(&text));
    }
}
