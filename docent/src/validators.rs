//! Syntactic validation of lead input (name, email, phone).
//!
//! Each validator returns the normalized value on acceptance or a
//! user-facing reason on rejection. The reasons are returned verbatim in
//! conversational replies, so keep them readable.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Rejection reason suitable for returning to the end user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn reject<T>(reason: &str) -> Result<T, ValidationError> {
    Err(ValidationError(reason.to_string()))
}

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._%+-]*@[a-zA-Z0-9][a-zA-Z0-9.-]*\.[a-zA-Z]{2,}$")
        .expect("email shape regex")
});

static PHONE_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // US/Canada: +1 (123) 456-7890
        r"^\+?1?\s*\(?[0-9]{3}\)?\s*[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}$",
        // International with country code
        r"^\+?[0-9]{1,4}\s*\(?[0-9]{2,4}\)?\s*[-.\s]?[0-9]{3,4}[-.\s]?[0-9]{3,4}$",
        // Bare 10 digits
        r"^[0-9]{10}$",
        // 123-456-7890 with any single separator
        r"^[0-9]{3}[-.\s][0-9]{3}[-.\s][0-9]{4}$",
        // (123) 456-7890
        r"^\([0-9]{3}\)\s*[0-9]{3}[-.\s]?[0-9]{4}$",
        // +12 123456789
        r"^\+[0-9]{1,3}\s*[0-9]{9,12}$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("phone shape regex"))
    .collect()
});

/// Validates a person name. Returns the trimmed name.
pub fn validate_name(input: &str) -> Result<String, ValidationError> {
    let name = input.trim();

    if name.is_empty() {
        return reject("Name cannot be empty.");
    }
    if name.chars().count() < 2 {
        return reject("Name must be at least 2 characters long.");
    }
    if name.chars().count() > 100 {
        return reject("Name is too long (maximum 100 characters).");
    }
    if !name.chars().any(|c| c.is_alphabetic()) {
        return reject("Name must contain at least one letter.");
    }

    let total = name.chars().count();
    let digits = name.chars().filter(|c| c.is_ascii_digit()).count();
    if digits as f64 / total as f64 > 0.3 {
        return reject("Name contains too many numbers. Please provide a valid name.");
    }

    for c in name.chars() {
        if !(c.is_alphabetic() || matches!(c, ' ' | '\'' | '-' | '.')) {
            return Err(ValidationError(format!(
                "Name contains invalid character: '{c}'. Only letters, spaces, hyphens, apostrophes, and periods are allowed."
            )));
        }
    }

    let specials = name.chars().filter(|c| matches!(c, '\'' | '-' | '.')).count();
    if specials > total / 2 {
        return reject("Name contains too many special characters.");
    }

    Ok(name.to_string())
}

/// Validates an email address. Returns the trimmed, lowercased address.
pub fn validate_email(input: &str) -> Result<String, ValidationError> {
    let email = input.trim().to_lowercase();

    if email.is_empty() {
        return reject("Email cannot be empty.");
    }
    if email.len() < 5 {
        return reject("Email is too short.");
    }
    if email.len() > 254 {
        return reject("Email is too long (maximum 254 characters).");
    }
    if !EMAIL_SHAPE.is_match(&email) {
        return reject(
            "Invalid email format. Please provide a valid email address (e.g., user@example.com).",
        );
    }
    if email.matches('@').count() != 1 {
        return reject("Email must contain exactly one @ symbol.");
    }

    let (local, domain) = email.split_once('@').expect("checked above");

    if local.is_empty() || local.len() > 64 {
        return reject("Invalid email format (local part issue).");
    }
    if local.starts_with('.') || local.ends_with('.') {
        return reject("Email cannot start or end with a period.");
    }
    if local.contains("..") {
        return reject("Email cannot contain consecutive periods.");
    }

    if domain.len() < 3 {
        return reject("Invalid email domain.");
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.starts_with('-') || domain.ends_with('-') {
        return reject("Invalid email domain format.");
    }
    if domain.contains("..") {
        return reject("Email domain cannot contain consecutive periods.");
    }
    if !domain.contains('.') {
        return reject("Email domain must contain at least one period.");
    }

    Ok(email)
}

/// Validates a phone number. Returns the trimmed number.
pub fn validate_phone(input: &str) -> Result<String, ValidationError> {
    let phone = input.trim();

    if phone.is_empty() {
        return reject("Phone number cannot be empty.");
    }
    if phone.len() < 7 {
        return reject("Phone number is too short (minimum 7 characters).");
    }
    if phone.len() > 20 {
        return reject("Phone number is too long (maximum 20 characters).");
    }
    if !PHONE_SHAPES.iter().any(|re| re.is_match(phone)) {
        return reject(
            "Invalid phone number format. Please provide a valid phone number (e.g., +1-234-567-8900 or (123) 456-7890).",
        );
    }

    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if digits < 10 {
        return reject("Phone number must contain at least 10 digits.");
    }

    Ok(phone.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_length_boundaries() {
        assert!(validate_name("A").is_err());
        assert!(validate_name("Al").is_ok());
        assert!(validate_name(&"a".repeat(100)).is_ok());
        assert!(validate_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn name_character_rules() {
        assert!(validate_name("Alice O'Connor").is_ok());
        assert!(validate_name("Jean-Luc").is_ok());
        assert!(validate_name("J. R. Ewing").is_ok());
        assert!(validate_name("12345").is_err());
        assert!(validate_name("Alice1234567").is_err()); // > 30% digits
        assert!(validate_name("Alice@Home").is_err());
        assert!(validate_name("--.-").is_err());
    }

    #[test]
    fn email_boundaries_and_shape() {
        assert!(validate_email("a@b.").is_err()); // len 4
        assert!(validate_email("a@b.c").is_err()); // tld too short for shape
        assert!(validate_email("a@b.co").is_ok());
        let local = "a".repeat(60);
        let long = format!("{local}@{}.com", "b".repeat(254 - 60 - 1 - 4));
        assert_eq!(long.len(), 254);
        assert!(validate_email(&long).is_ok());
        assert!(validate_email(&format!("{long}x")).is_err());
    }

    #[test]
    fn email_structure_rules() {
        assert!(validate_email("alice@example.com").is_ok());
        assert_eq!(validate_email("ALICE@Example.COM").unwrap(), "alice@example.com");
        assert!(validate_email("al..ice@example.com").is_err());
        assert!(validate_email(".alice@example.com").is_err());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("alice@@example.com").is_err());
        assert!(validate_email("alice@-example.com").is_err());
    }

    #[test]
    fn phone_shapes() {
        assert!(validate_phone("+1 415 555 2671").is_ok());
        assert!(validate_phone("(123) 456-7890").is_ok());
        assert!(validate_phone("123-456-7890").is_ok());
        assert!(validate_phone("1234567890").is_ok());
        assert!(validate_phone("not really").is_err());
        assert!(validate_phone("123-4567").is_err()); // only 7 digits
        assert!(validate_phone("123456789").is_err()); // 9 digits
    }

    #[test]
    fn validators_are_idempotent_on_accepted_values() {
        for raw in ["  Alice O'Connor ", "Jean-Luc"] {
            let once = validate_name(raw).unwrap();
            assert_eq!(validate_name(&once).unwrap(), once);
        }
        for raw in [" Alice@Example.COM "] {
            let once = validate_email(raw).unwrap();
            assert_eq!(validate_email(&once).unwrap(), once);
        }
        for raw in [" +1 415 555 2671 "] {
            let once = validate_phone(raw).unwrap();
            assert_eq!(validate_phone(&once).unwrap(), once);
        }
    }
}
