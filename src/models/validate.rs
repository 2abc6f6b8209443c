//! Field shape validation for canonical records.
//!
//! The national ID checksum and the gender-from-digit-parity rule are the
//! mainland-China resident ID algorithms; they do not transfer to other
//! ID systems.

use std::sync::OnceLock;

use regex::Regex;

/// Weights for the first 17 digits of an 18-character resident ID.
const ID_WEIGHTS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];

/// Check characters indexed by the weighted sum mod 11.
const ID_CHECK_CHARS: [char; 11] = ['1', '0', 'X', '9', '8', '7', '6', '5', '4', '3', '2'];

/// Canonical gender tokens. Every recognized spelling normalizes to one
/// of these two.
pub const GENDER_MALE: &str = "male";
pub const GENDER_FEMALE: &str = "female";

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^1[3-9]\d{9}$").expect("phone regex is valid"))
}

/// Validate an 18-character national ID number, including its checksum digit.
pub fn is_valid_id_card(id: &str) -> bool {
    let chars: Vec<char> = id.trim().to_uppercase().chars().collect();
    if chars.len() != 18 {
        return false;
    }
    let mut sum: u32 = 0;
    for (i, c) in chars[..17].iter().enumerate() {
        match c.to_digit(10) {
            Some(d) => sum += d * ID_WEIGHTS[i],
            None => return false,
        }
    }
    chars[17] == ID_CHECK_CHARS[(sum % 11) as usize]
}

/// Validate the local mobile-number shape (11 digits, 1[3-9] prefix).
pub fn is_valid_phone(phone: &str) -> bool {
    phone_regex().is_match(phone.trim())
}

/// Normalize a recognized gender value to one of the two canonical tokens.
/// Returns None when the value is not recognizable as either.
pub fn normalize_gender(raw: &str) -> Option<&'static str> {
    match raw.trim().to_lowercase().as_str() {
        "male" | "m" | "man" | "男" | "男性" => Some(GENDER_MALE),
        "female" | "f" | "woman" | "女" | "女性" => Some(GENDER_FEMALE),
        _ => None,
    }
}

/// Derive gender from the parity of digit 17 of a syntactically plausible
/// 18-character ID (odd = male, even = female). Returns None when the ID
/// is too short or the digit is not numeric. Checksum validity is not
/// required here; that is the fusion engine's concern.
pub fn gender_from_id_card(id: &str) -> Option<&'static str> {
    let seq_digit = id.trim().chars().nth(16)?.to_digit(10)?;
    if seq_digit % 2 == 1 {
        Some(GENDER_MALE)
    } else {
        Some(GENDER_FEMALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 11010519491231002X is the published example number with a valid checksum.
    const VALID_ID: &str = "11010519491231002X";

    #[test]
    fn valid_id_accepted() {
        assert!(is_valid_id_card(VALID_ID));
        assert!(is_valid_id_card("11010519491231002x"), "lowercase x accepted");
    }

    #[test]
    fn wrong_checksum_digit_rejected() {
        assert!(!is_valid_id_card("110105194912310021"));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(!is_valid_id_card("1101051949123002X"));
        assert!(!is_valid_id_card(""));
    }

    #[test]
    fn non_numeric_body_rejected() {
        assert!(!is_valid_id_card("11010519491231A02X"));
    }

    #[test]
    fn phone_shape() {
        assert!(is_valid_phone("13812345678"));
        assert!(is_valid_phone(" 19912345678 "));
        assert!(!is_valid_phone("12812345678"), "1[0-2] prefixes invalid");
        assert!(!is_valid_phone("1381234567"));
        assert!(!is_valid_phone("138123456789"));
    }

    #[test]
    fn gender_normalization() {
        assert_eq!(normalize_gender("男"), Some(GENDER_MALE));
        assert_eq!(normalize_gender("Female"), Some(GENDER_FEMALE));
        assert_eq!(normalize_gender(" M "), Some(GENDER_MALE));
        assert_eq!(normalize_gender("unknown"), None);
    }

    #[test]
    fn gender_from_id_parity() {
        // digit 17 of the example number is '2' -> even -> female
        assert_eq!(gender_from_id_card(VALID_ID), Some(GENDER_FEMALE));
        assert_eq!(gender_from_id_card("110105194912310living"), None);
        assert_eq!(gender_from_id_card("short"), None);
    }
}
