//! Form validation shared by the login, registration, address and contact
//! forms.
//!
//! Messages are customer-facing and therefore in Vietnamese.

use crate::types::Email;

/// A single failed form rule.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Vui lòng nhập {0}")]
    Required(&'static str),

    #[error("Email không hợp lệ")]
    InvalidEmail,

    #[error("Số điện thoại phải có 10-11 chữ số")]
    InvalidPhone,

    #[error("Mật khẩu phải có ít nhất {min} ký tự")]
    PasswordTooShort { min: usize },

    #[error("Mật khẩu phải chứa ít nhất một chữ cái")]
    PasswordNeedsLetter,

    #[error("Mật khẩu phải chứa ít nhất một chữ số")]
    PasswordNeedsDigit,

    #[error("Mật khẩu xác nhận không khớp")]
    PasswordMismatch,
}

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Trim `value` and reject it when nothing is left.
///
/// `field` is the Vietnamese field name used in the message.
///
/// # Errors
///
/// Returns [`ValidationError::Required`] for blank input.
pub fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(trimmed)
    }
}

/// Validate a required email field.
///
/// # Errors
///
/// [`ValidationError::Required`] for blank input,
/// [`ValidationError::InvalidEmail`] when the shape check fails.
pub fn email(value: &str) -> Result<Email, ValidationError> {
    let trimmed = required(value, "email")?;
    Email::parse(trimmed).map_err(|_| ValidationError::InvalidEmail)
}

/// Validate a Vietnamese phone number: 10 or 11 digits once whitespace is
/// removed. Returns the compacted number.
///
/// # Errors
///
/// [`ValidationError::Required`] for blank input,
/// [`ValidationError::InvalidPhone`] otherwise.
pub fn phone(value: &str) -> Result<String, ValidationError> {
    required(value, "số điện thoại")?;
    let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let valid_len = (10..=11).contains(&digits.len());
    if valid_len && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(digits)
    } else {
        Err(ValidationError::InvalidPhone)
    }
}

/// Validate a new password: at least [`MIN_PASSWORD_LENGTH`] characters with
/// at least one letter and one digit.
///
/// # Errors
///
/// Returns the first rule the password breaks.
pub fn password(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Required("mật khẩu"));
    }
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    if !value.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::PasswordNeedsLetter);
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::PasswordNeedsDigit);
    }
    Ok(())
}

/// Check the confirmation field matches the password.
///
/// # Errors
///
/// [`ValidationError::PasswordMismatch`] when they differ.
pub fn password_confirmation(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password == confirmation {
        Ok(())
    } else {
        Err(ValidationError::PasswordMismatch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  Lan  ", "họ tên").unwrap(), "Lan");
        assert_eq!(
            required("   ", "họ tên"),
            Err(ValidationError::Required("họ tên"))
        );
        assert_eq!(
            ValidationError::Required("họ tên").to_string(),
            "Vui lòng nhập họ tên"
        );
    }

    #[test]
    fn test_email() {
        assert_eq!(email(" a@b.vn ").unwrap().as_str(), "a@b.vn");
        assert_eq!(email("not-an-email"), Err(ValidationError::InvalidEmail));
        assert_eq!(email(""), Err(ValidationError::Required("email")));
    }

    #[test]
    fn test_phone_strips_whitespace() {
        assert_eq!(phone("0912 345 678").unwrap(), "0912345678");
        assert_eq!(phone("09123456789").unwrap(), "09123456789");
        assert_eq!(phone("091234567"), Err(ValidationError::InvalidPhone));
        assert_eq!(phone("091234567890"), Err(ValidationError::InvalidPhone));
        assert_eq!(phone("09123a5678"), Err(ValidationError::InvalidPhone));
    }

    #[test]
    fn test_password_rules() {
        assert!(password("abcd1234").is_ok());
        assert_eq!(
            password("abc123"),
            Err(ValidationError::PasswordTooShort { min: 8 })
        );
        assert_eq!(password("12345678"), Err(ValidationError::PasswordNeedsLetter));
        assert_eq!(password("éééééé12"), Err(ValidationError::PasswordNeedsLetter));
        assert_eq!(password("abcdefgh"), Err(ValidationError::PasswordNeedsDigit));
        assert_eq!(password(""), Err(ValidationError::Required("mật khẩu")));
    }

    #[test]
    fn test_password_confirmation() {
        assert!(password_confirmation("abcd1234", "abcd1234").is_ok());
        assert_eq!(
            password_confirmation("abcd1234", "abcd1235"),
            Err(ValidationError::PasswordMismatch)
        );
    }
}
