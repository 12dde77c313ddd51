use crate::error::PhoneFormatError;
use crate::model::CanonicalPhone;

/// Reduces an arbitrary phone string to its canonical ten-digit key.
///
/// Every non-digit character is stripped; an eleven-digit result starting
/// with `1` loses the leading country code. Anything that does not end up as
/// exactly ten digits fails with a [`PhoneFormatError`] carrying the raw
/// value for the remark text.
pub fn canonicalize(raw: &str) -> Result<CanonicalPhone, PhoneFormatError> {
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits.remove(0);
    }
    if digits.len() == 10 {
        Ok(CanonicalPhone(digits))
    } else {
        Err(PhoneFormatError {
            raw: raw.trim().to_string(),
        })
    }
}
