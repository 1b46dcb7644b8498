//! Shape-preserving masks for MASKED tokens
//!
//! Masks are deterministic and irreversible. They operate on characters,
//! not bytes, so multi-byte input is never split.

use crate::policy::MaskShape;
use regex::Regex;
use std::sync::OnceLock;

/// Minimum digit count for a value to be treated as phone-like
const PHONE_MIN_DIGITS: usize = 7;

/// Digits kept by phone masking
const PHONE_KEEP_DIGITS: usize = 4;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([^@\s]+)@([^@\s]+\.[^@\s]+)\s*$").unwrap())
}

/// Apply a mask shape to a value
///
/// Surrounding whitespace is ignored when picking the shape. A value made
/// only of whitespace is masked character for character.
pub fn mask(value: &str, shape: MaskShape, mask_char: char) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return repeat(mask_char, value.chars().count());
    }
    let value = trimmed;

    match shape {
        MaskShape::Auto => {
            if value.contains('@') {
                mask_email(value, mask_char)
            } else if digit_count(value) >= PHONE_MIN_DIGITS {
                mask_phone(value, mask_char)
            } else {
                mask_generic(value, mask_char)
            }
        }
        MaskShape::Email => mask_email(value, mask_char),
        MaskShape::Phone => mask_phone(value, mask_char),
        MaskShape::Generic => mask_generic(value, mask_char),
        MaskShape::KeepLast { count } => mask_keep_last(value, count, mask_char),
    }
}

fn repeat(mask_char: char, n: usize) -> String {
    std::iter::repeat(mask_char).take(n).collect()
}

fn digit_count(value: &str) -> usize {
    value.chars().filter(char::is_ascii_digit).count()
}

/// `john.doe@gmail.com` → `j***@gmail.com`
fn mask_email(value: &str, mask_char: char) -> String {
    let Some(caps) = email_regex().captures(value) else {
        return mask_generic(value, mask_char);
    };
    let local = &caps[1];
    let domain = &caps[2];

    match local.chars().next() {
        Some(first) => format!("{}{}@{}", first, repeat(mask_char, 3), domain),
        None => format!("{}@{}", repeat(mask_char, 3), domain),
    }
}

/// `+1 (555) 123-4567` → `***-***-4567`
fn mask_phone(value: &str, mask_char: char) -> String {
    let digits: Vec<char> = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() <= PHONE_KEEP_DIGITS {
        return repeat(mask_char, digits.len());
    }

    let last: String = digits[digits.len() - PHONE_KEEP_DIGITS..].iter().collect();
    let group = repeat(mask_char, 3);
    format!("{}-{}-{}", group, group, last)
}

/// `abcd` → `a**d`; two characters or fewer are fully masked
fn mask_generic(value: &str, mask_char: char) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 2 {
        return repeat(mask_char, chars.len());
    }
    let mut out = String::with_capacity(value.len());
    out.push(chars[0]);
    out.push_str(&repeat(mask_char, chars.len() - 2));
    out.push(chars[chars.len() - 1]);
    out
}

/// `4111111111111111` with count 4 → `************1111`
fn mask_keep_last(value: &str, count: usize, mask_char: char) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= count {
        return repeat(mask_char, chars.len());
    }
    let split = chars.len() - count;
    let mut out = repeat(mask_char, split);
    out.extend(&chars[split..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_keeps_domain() {
        assert_eq!(mask("alice@example.com", MaskShape::Auto, '*'), "a***@example.com");
        assert_eq!(mask("john.doe@gmail.com", MaskShape::Email, '*'), "j***@gmail.com");
        assert_eq!(mask("  bob@corp.io  ", MaskShape::Auto, '#'), "b###@corp.io");
    }

    #[test]
    fn test_malformed_email_falls_back_to_generic() {
        assert_eq!(mask("not@anemail", MaskShape::Email, '*'), "n*********l");
    }

    #[test]
    fn test_phone_keeps_last_four() {
        assert_eq!(mask("+1 (555) 123-4567", MaskShape::Auto, '*'), "***-***-4567");
        assert_eq!(mask("5551234567", MaskShape::Phone, '*'), "***-***-4567");
        assert_eq!(mask("123", MaskShape::Phone, '*'), "***");
    }

    #[test]
    fn test_generic() {
        assert_eq!(mask("abcd", MaskShape::Generic, '*'), "a**d");
        assert_eq!(mask("ab", MaskShape::Generic, '*'), "**");
        assert_eq!(mask("Zoë", MaskShape::Auto, '*'), "Z*ë");
    }

    #[test]
    fn test_keep_last_preserves_length() {
        let masked = mask("4111111111111111", MaskShape::KeepLast { count: 4 }, '*');
        assert_eq!(masked, "************1111");
        assert_eq!(masked.chars().count(), 16);
        assert_eq!(mask("12", MaskShape::KeepLast { count: 4 }, '*'), "**");
    }

    #[test]
    fn test_deterministic() {
        let a = mask("carol@example.org", MaskShape::Auto, '*');
        let b = mask("carol@example.org", MaskShape::Auto, '*');
        assert_eq!(a, b);
    }

    #[test]
    fn test_whitespace_only_is_masked() {
        assert_eq!(mask("", MaskShape::Auto, '*'), "");
        assert_eq!(mask("   ", MaskShape::Auto, '*'), "***");
    }
}
