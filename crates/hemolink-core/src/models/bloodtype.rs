//! Derived blood-type computation.
//!
//! The combined column (`result_blood_type`) is maintained in application
//! code on every write path, with a one-time backfill for rows predating the
//! rule. Recognized sign spellings, case-insensitive after trimming:
//! - `positive`, `pos`, `+`, `plus` → `+`
//! - `negative`, `neg`, `-`, `minus` → `-`
//! - otherwise, a literal `+` or `-` anywhere in the value decides it
//! - anything else yields no derived value

/// Normalize an Rh-factor spelling to its sign.
pub fn normalize_rh_sign(rh_factor: &str) -> Option<char> {
    let lower = rh_factor.trim().to_lowercase();
    match lower.as_str() {
        "positive" | "pos" | "+" | "plus" => Some('+'),
        "negative" | "neg" | "-" | "minus" => Some('-'),
        _ => {
            if lower.contains('+') {
                Some('+')
            } else if lower.contains('-') {
                Some('-')
            } else {
                None
            }
        }
    }
}

/// Derive the combined blood type, e.g. `("AB", "positive")` → `"AB+"`.
///
/// Returns None when either part is missing or the sign is unrecognized.
pub fn derive_result_blood_type(blood_type: &str, rh_factor: &str) -> Option<String> {
    let blood_type = blood_type.trim();
    if blood_type.is_empty() {
        return None;
    }
    let sign = normalize_rh_sign(rh_factor)?;
    Some(format!("{}{}", blood_type.to_uppercase(), sign))
}
