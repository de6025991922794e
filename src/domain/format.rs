//! Pure string transforms used by the form layer.
//!
//! Phone numbers are displayed in U.S. format while the user types and are
//! sent to the server as bare digits.

/// Maximum number of digits kept in a formatted phone number.
pub const PHONE_DIGITS: usize = 10;

/// Formats arbitrary input as a U.S. phone number, progressively.
///
/// Every non-digit character is discarded and digits beyond the tenth are
/// dropped. Partial input is formatted as far as it goes.
///
/// # Examples
///
/// ```
/// use taxwiz::domain::format_phone_number;
///
/// assert_eq!(format_phone_number(""), "");
/// assert_eq!(format_phone_number("12"), "(12)");
/// assert_eq!(format_phone_number("12345"), "(123) 45");
/// assert_eq!(format_phone_number("123-456-7890 ext 9"), "(123) 456-7890");
/// ```
pub fn format_phone_number(raw: &str) -> String {
    let digits: String = digits_only(raw).chars().take(PHONE_DIGITS).collect();

    match digits.len() {
        0 => String::new(),
        1..=3 => format!("({})", digits),
        4..=6 => format!("({}) {}", &digits[..3], &digits[3..]),
        _ => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    }
}

/// Strips the display punctuation from a phone number.
///
/// # Examples
///
/// ```
/// use taxwiz::domain::unformat_phone_number;
///
/// assert_eq!(unformat_phone_number("(123) 456-7890"), "1234567890");
/// ```
pub fn unformat_phone_number(formatted: &str) -> String {
    digits_only(formatted)
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Turns a camelCase field name into a label: "phoneNumber" -> "Phone Number".
pub fn derive_label(name: &str) -> String {
    let mut chars = name.chars();
    let mut label = String::with_capacity(name.len() + 4);

    if let Some(first) = chars.next() {
        label.extend(first.to_uppercase());
    }
    for ch in chars {
        if ch.is_uppercase() {
            label.push(' ');
        }
        label.push(ch);
    }
    label
}
