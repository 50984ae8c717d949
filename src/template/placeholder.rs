//! Placeholder tokens standing in for interpolated values.
//!
//! Token format: `{prefix}{nonce}-{index}-`. The nonce is a per-parse counter
//! followed by 32 random bits, so user markup is very unlikely to contain it.
//! The trailing `-` keeps `...-1-` from matching inside `...-12-`. Tokens are
//! lowercase ASCII starting with a letter, so they are valid tag and
//! attribute names.

use std::cell::Cell;

use crate::config;

thread_local! {
    static PARSE_COUNTER: Cell<u64> = const { Cell::new(0) };
}

/// Piece of a string that may contain tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Static(&'a str),
    Slot(usize),
}

/// Token family for one parse.
#[derive(Debug, Clone)]
pub(crate) struct Placeholders {
    stem: String,
}

impl Placeholders {
    pub(crate) fn generate() -> Self {
        let count = PARSE_COUNTER.with(|counter| {
            let next = counter.get().wrapping_add(1);
            counter.set(next);
            next
        });
        let salt: u32 = rand::random();
        Self {
            stem: format!("{}{count:x}{salt:08x}-", config::placeholder_prefix()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_stem(stem: &str) -> Self {
        Self { stem: stem.to_string() }
    }

    pub(crate) fn token(&self, index: usize) -> String {
        format!("{}{index}-", self.stem)
    }

    /// Whether `text` contains anything that starts like a token.
    pub(crate) fn appears_in(&self, text: &str) -> bool {
        text.contains(&self.stem)
    }

    /// Index of `text` when it is exactly one token.
    pub(crate) fn parse_token(&self, text: &str) -> Option<usize> {
        match self.split(text).as_slice() {
            [Segment::Slot(index)] => Some(*index),
            _ => None,
        }
    }

    /// Split `text` into static runs and tokens. Empty static runs are
    /// omitted.
    pub(crate) fn split<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        let mut segments = Vec::new();
        let mut static_start = 0;
        let mut search_from = 0;

        while let Some(offset) = text[search_from..].find(&self.stem) {
            let found = search_from + offset;
            let after_stem = found + self.stem.len();
            let digits = text[after_stem..].bytes().take_while(u8::is_ascii_digit).count();
            let end = after_stem + digits;
            let index = (digits > 0 && text.as_bytes().get(end) == Some(&b'-'))
                .then(|| text[after_stem..end].parse::<usize>().ok())
                .flatten();

            match index {
                Some(index) => {
                    if found > static_start {
                        segments.push(Segment::Static(&text[static_start..found]));
                    }
                    segments.push(Segment::Slot(index));
                    static_start = end + 1;
                    search_from = static_start;
                }
                // Looks like a token but is not one; keep it as text.
                None => search_from = found + 1,
            }
        }
        if static_start < text.len() {
            segments.push(Segment::Static(&text[static_start..]));
        }
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_valid_names() {
        let placeholders = Placeholders::generate();
        let token = placeholders.token(3);
        assert!(token.starts_with("sp-"));
        assert!(token.ends_with("-3-"));
        assert!(token.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_each_parse_gets_a_new_stem() {
        let a = Placeholders::generate();
        let b = Placeholders::generate();
        assert_ne!(a.token(0), b.token(0));
    }

    #[test]
    fn test_split_mixed_text() {
        let p = Placeholders::with_stem("sp-x-");
        let text = "Hello sp-x-0-, you have sp-x-12- new sp-x-oops";
        assert_eq!(
            p.split(text),
            vec![
                Segment::Static("Hello "),
                Segment::Slot(0),
                Segment::Static(", you have "),
                Segment::Slot(12),
                Segment::Static(" new sp-x-oops"),
            ]
        );
    }

    #[test]
    fn test_parse_token_requires_exact_match() {
        let p = Placeholders::with_stem("sp-x-");
        assert_eq!(p.parse_token("sp-x-4-"), Some(4));
        assert_eq!(p.parse_token("sp-x-4-tail"), None);
        assert_eq!(p.parse_token("sp-x-4"), None, "terminator is required");
    }

    proptest::proptest! {
        #[test]
        fn prop_generated_stems_are_unique(count in 2usize..64) {
            let mut seen = std::collections::HashSet::new();
            for _ in 0..count {
                proptest::prop_assert!(seen.insert(Placeholders::generate().token(0)));
            }
        }

        #[test]
        fn prop_split_recovers_indices(statics in proptest::collection::vec("[a-z <>=\"/]{0,12}", 1..6)) {
            let p = Placeholders::generate();
            let mut source = String::new();
            for (index, part) in statics.iter().enumerate() {
                source.push_str(part);
                if index + 1 < statics.len() {
                    source.push_str(&p.token(index));
                }
            }
            let slots: Vec<usize> = p
                .split(&source)
                .into_iter()
                .filter_map(|segment| match segment {
                    Segment::Slot(index) => Some(index),
                    Segment::Static(_) => None,
                })
                .collect();
            proptest::prop_assert_eq!(slots, (0..statics.len() - 1).collect::<Vec<_>>());
        }
    }
}
