//! Czech-aware ordering of warehouse positions for pick lists.
//!
//! Three levels, compared in order:
//! 1. primary: symbols < digit runs (numeric) < letters; háček letters
//!    (č, ř, š, ž) sort right after their base letter, the digraph ch is
//!    one letter between h and i, other accents are equal to the base letter
//! 2. secondary: accents
//! 3. tertiary: lowercase before uppercase

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Primary {
    Symbol(u32),
    /// Digit run without leading zeros, compared by length then digits
    Number(usize, String),
    Letter(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CollationKey {
    primary: Vec<Primary>,
    secondary: Vec<u8>,
    tertiary: Vec<bool>,
}

/// (base letter, own primary slot after the base, accent weight)
fn fold_letter(c: char) -> (char, bool, u8) {
    match c {
        'á' => ('a', false, 1),
        'ä' => ('a', false, 2),
        'č' => ('c', true, 0),
        'ď' => ('d', false, 1),
        'é' => ('e', false, 1),
        'ě' => ('e', false, 2),
        'í' => ('i', false, 1),
        'ň' => ('n', false, 1),
        'ó' => ('o', false, 1),
        'ö' => ('o', false, 2),
        'ř' => ('r', true, 0),
        'š' => ('s', true, 0),
        'ť' => ('t', false, 1),
        'ú' => ('u', false, 1),
        'ů' => ('u', false, 2),
        'ü' => ('u', false, 3),
        'ý' => ('y', false, 1),
        'ž' => ('z', true, 0),
        other => (other, false, 0),
    }
}

fn collation_key(value: &str) -> CollationKey {
    let mut key = CollationKey {
        primary: Vec::new(),
        secondary: Vec::new(),
        tertiary: Vec::new(),
    };

    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            let mut digits = String::from(c);
            while let Some(next) = chars.next_if(|n| n.is_ascii_digit()) {
                digits.push(next);
            }
            let significant = digits.trim_start_matches('0');
            let significant = if significant.is_empty() { "0" } else { significant };
            key.primary
                .push(Primary::Number(significant.len(), significant.to_string()));
            key.secondary.push(0);
            key.tertiary.push(false);
            continue;
        }

        if c.is_alphabetic() {
            let lower = c.to_lowercase().next().unwrap_or(c);
            if lower == 'c' && chars.next_if(|n| matches!(n, 'h' | 'H')).is_some() {
                key.primary.push(Primary::Letter(('h' as u32) * 2 + 1));
                key.secondary.push(0);
                key.tertiary.push(c.is_uppercase());
                continue;
            }
            let (base, own_slot, accent) = fold_letter(lower);
            let weight = (base as u32) * 2 + u32::from(own_slot);
            key.primary.push(Primary::Letter(weight));
            key.secondary.push(accent);
            key.tertiary.push(c.is_uppercase());
            continue;
        }

        if c.is_whitespace() {
            continue;
        }

        key.primary.push(Primary::Symbol(c as u32));
        key.secondary.push(0);
        key.tertiary.push(false);
    }

    key
}

/// Compare two positions; items without a position go last
pub fn compare_positions(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => collation_key(a)
            .cmp(&collation_key(b))
            .then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(values: &[&str]) -> Vec<String> {
        let mut v: Vec<&str> = values.to_vec();
        v.sort_by(|a, b| compare_positions(Some(a), Some(b)));
        v.into_iter().map(String::from).collect()
    }

    #[test]
    fn test_digit_runs_compare_numerically() {
        assert_eq!(sorted(&["A-10", "A-2", "A-1"]), vec!["A-1", "A-2", "A-10"]);
        assert_eq!(sorted(&["R02", "R1"]), vec!["R1", "R02"]);
    }

    #[test]
    fn test_hacek_letters_follow_base() {
        assert_eq!(sorted(&["čep", "dub", "cop"]), vec!["cop", "čep", "dub"]);
        assert_eq!(sorted(&["šroub", "tác", "sklo"]), vec!["sklo", "šroub", "tác"]);
    }

    #[test]
    fn test_ch_sorts_between_h_and_i() {
        assert_eq!(
            sorted(&["I-1", "CH-1", "C-1", "H-1"]),
            vec!["C-1", "H-1", "CH-1", "I-1"]
        );
        assert_eq!(sorted(&["chléb", "hrnek", "cukr"]), vec!["cukr", "hrnek", "chléb"]);
        assert_eq!(sorted(&["Ch2", "ch2"]), vec!["ch2", "Ch2"]);
    }

    #[test]
    fn test_accents_are_secondary() {
        assert_eq!(sorted(&["ráj", "rak", "rab"]), vec!["rab", "ráj", "rak"]);
    }

    #[test]
    fn test_case_insensitive_primary() {
        assert_eq!(sorted(&["b1", "A2", "a1"]), vec!["a1", "A2", "b1"]);
    }

    #[test]
    fn test_missing_position_sorts_last() {
        assert_eq!(compare_positions(None, Some("A")), Ordering::Greater);
        assert_eq!(compare_positions(Some("Z"), None), Ordering::Less);
        assert_eq!(compare_positions(None, None), Ordering::Equal);
    }
}
