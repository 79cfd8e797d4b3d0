//! Field validation and canonicalization for user-supplied input.
//!
//! Phone numbers normalize to E.164 and are restricted to RU and BY.

const PHONE_HINT: &str = "Invalid phone number. Example: +79991234567";

/// Normalize a raw phone number to its canonical E.164 form.
///
/// Accepts RU (`+7` + 10 digits) and BY (`+375` + 9 digits) numbers. An
/// 11-digit number with the national `8` prefix is rewritten to `+7`, and a
/// bare `7…` without the plus gains one. Idempotent on its own output.
pub fn normalize_phone(raw: &str) -> Result<String, String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if cleaned.is_empty() {
        return Err("Enter a phone number".to_string());
    }

    let cleaned = if cleaned.starts_with('8') && cleaned.len() == 11 {
        format!("+7{}", &cleaned[1..])
    } else if cleaned.starts_with('7') && cleaned.len() == 11 {
        format!("+{cleaned}")
    } else {
        cleaned
    };

    let digits = match cleaned.strip_prefix('+') {
        Some(rest) if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) => rest,
        _ => return Err(PHONE_HINT.to_string()),
    };

    if let Some(national) = digits.strip_prefix("375") {
        if national.len() == 9 && !national.starts_with('0') {
            return Ok(format!("+375{national}"));
        }
    } else if let Some(national) = digits.strip_prefix('7') {
        if national.len() == 10 && matches!(national.as_bytes()[0], b'3'..=b'9') {
            return Ok(format!("+7{national}"));
        }
    }

    Err(PHONE_HINT.to_string())
}

/// Lowercase and validate an email address.
pub fn normalize_email(raw: &str) -> Result<String, String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err("Enter an email address".to_string());
    }
    if email.len() > 50 {
        return Err("Email address is too long".to_string());
    }
    if email.matches('@').count() != 1 {
        return Err("Invalid email address".to_string());
    }
    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => return Err("Invalid email address".to_string()),
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return Err("Invalid email address".to_string());
    }
    Ok(email)
}

/// A personal name: 2-30 letters of a single script, capitalized.
pub fn validate_name(label: &str, value: &str) -> Result<(), String> {
    let count = value.chars().count();
    if !(2..=30).contains(&count) {
        return Err(format!("{label} must be 2 to 30 letters"));
    }
    let all_latin = value.chars().all(|c| c.is_ascii_alphabetic());
    let all_cyrillic = value.chars().all(is_cyrillic);
    if !(all_latin || all_cyrillic) {
        return Err(format!("{label} must use letters of a single alphabet"));
    }
    let starts_upper = value.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
    if !starts_upper {
        return Err(format!("{label} must start with a capital letter"));
    }
    Ok(())
}

/// Password policy: 8-50 characters with upper, lower, and a digit.
pub fn validate_password(value: &str) -> Result<(), String> {
    let count = value.chars().count();
    if !(8..=50).contains(&count) {
        return Err("Password must be 8 to 50 characters".to_string());
    }
    let has_upper = value.chars().any(|c| c.is_uppercase());
    let has_lower = value.chars().any(|c| c.is_lowercase());
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err(
            "Password must contain an uppercase letter, a lowercase letter and a digit"
                .to_string(),
        );
    }
    Ok(())
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, 'А'..='я' | 'Ё' | 'ё')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_national_prefix_to_plus_seven() {
        assert_eq!(
            normalize_phone("8 (999) 123-45-67").as_deref(),
            Ok("+79991234567")
        );
        assert_eq!(normalize_phone("79991234567").as_deref(), Ok("+79991234567"));
        assert_eq!(
            normalize_phone("+7 999 123 45 67").as_deref(),
            Ok("+79991234567")
        );
    }

    #[test]
    fn accepts_belarusian_numbers() {
        assert_eq!(
            normalize_phone("+375 29 123-45-67").as_deref(),
            Ok("+375291234567")
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["8 (999) 123-45-67", "+375291234567", "79991234567"] {
            let once = normalize_phone(raw).unwrap();
            assert_eq!(normalize_phone(&once).unwrap(), once);
        }
    }

    #[test]
    fn rejects_other_regions_and_malformed_input() {
        assert!(normalize_phone("+1 202 555 0100").is_err());
        assert!(normalize_phone("+7999123456").is_err()); // 9 national digits
        assert!(normalize_phone("+799912345678").is_err()); // 11 national digits
        assert!(normalize_phone("+70991234567").is_err()); // bad leading digit
        assert!(normalize_phone("").is_err());
        assert!(normalize_phone("call me").is_err());
    }

    #[test]
    fn email_is_lowercased_and_checked() {
        assert_eq!(
            normalize_email("  User@Mail.RU ").as_deref(),
            Ok("user@mail.ru")
        );
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("two@@mail.ru").is_err());
        assert!(normalize_email("@mail.ru").is_err());
        assert!(normalize_email("user@localhost").is_err());
        let long = format!("{}@mail.ru", "x".repeat(60));
        assert!(normalize_email(&long).is_err());
    }

    #[test]
    fn name_rules() {
        assert!(validate_name("First name", "Ivan").is_ok());
        assert!(validate_name("First name", "Иван").is_ok());
        assert!(validate_name("First name", "ivan").is_err());
        assert!(validate_name("First name", "I").is_err());
        assert!(validate_name("First name", "Iva4n").is_err());
        assert!(validate_name("First name", "Ivaн").is_err()); // mixed scripts
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("Passw0rd").is_ok());
        assert!(validate_password("short1A").is_err());
        assert!(validate_password("alllowercase1").is_err());
        assert!(validate_password("ALLUPPERCASE1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
    }
}
