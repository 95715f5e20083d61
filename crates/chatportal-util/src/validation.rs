use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("value is too short (min {min}, got {got})")]
    TooShort { min: usize, got: usize },
    #[error("value is too long (max {max}, got {got})")]
    TooLong { max: usize, got: usize },
    #[error("invalid characters")]
    InvalidCharacters,
    #[error("invalid format")]
    InvalidFormat,
}

pub fn validate_login_id(login_id: &str) -> Result<(), ValidationError> {
    let len = login_id.chars().count();
    if len < 3 {
        return Err(ValidationError::TooShort { min: 3, got: len });
    }
    if len > 50 {
        return Err(ValidationError::TooLong { max: 50, got: len });
    }
    if !login_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ValidationError::InvalidCharacters);
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if len < 1 {
        return Err(ValidationError::TooShort { min: 1, got: len });
    }
    if len > 100 {
        return Err(ValidationError::TooLong { max: 100, got: len });
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.len() > 255 {
        return Err(ValidationError::TooLong { max: 255, got: email.len() });
    }
    let parts: Vec<&str> = email.splitn(2, '@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ValidationError::InvalidFormat);
    }
    if !parts[1].contains('.') {
        return Err(ValidationError::InvalidFormat);
    }
    Ok(())
}

// ── Password policy ─────────────────────────────────────────────────────

pub const PASSWORD_MIN_LEN: usize = 10;
pub const PASSWORD_MAX_LEN: usize = 20;
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*()-_=+[]{};:,./?~|";
pub const PASSWORD_FORBIDDEN_CHARS: &str = "<>'\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    Length,
    Uppercase,
    Lowercase,
    Digit,
    Special,
    NoForbiddenCharacters,
}

/// Every rule, in the order they are shown to users.
pub const PASSWORD_RULES: [PasswordRule; 6] = [
    PasswordRule::Length,
    PasswordRule::Uppercase,
    PasswordRule::Lowercase,
    PasswordRule::Digit,
    PasswordRule::Special,
    PasswordRule::NoForbiddenCharacters,
];

impl PasswordRule {
    /// Text used both as the policy listing and as the violation message.
    pub fn description(self) -> &'static str {
        match self {
            Self::Length => "Password must be 10 to 20 characters long",
            Self::Uppercase => "Password must contain at least one uppercase letter",
            Self::Lowercase => "Password must contain at least one lowercase letter",
            Self::Digit => "Password must contain at least one digit",
            Self::Special => {
                "Password must contain at least one special character (!@#$%^&*()-_=+[]{};:,./?~|)"
            }
            Self::NoForbiddenCharacters => "Password must not contain < > ' or \"",
        }
    }

    pub fn is_satisfied(self, password: &str) -> bool {
        match self {
            Self::Length => {
                let len = password.chars().count();
                (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len)
            }
            Self::Uppercase => password.chars().any(|c| c.is_ascii_uppercase()),
            Self::Lowercase => password.chars().any(|c| c.is_ascii_lowercase()),
            Self::Digit => password.chars().any(|c| c.is_ascii_digit()),
            Self::Special => password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)),
            Self::NoForbiddenCharacters => {
                !password.chars().any(|c| PASSWORD_FORBIDDEN_CHARS.contains(c))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Checks every rule and reports all violations at once.
pub fn validate_password(password: &str) -> PasswordReport {
    let errors: Vec<String> = PASSWORD_RULES
        .iter()
        .filter(|rule| !rule.is_satisfied(password))
        .map(|rule| rule.description().to_string())
        .collect();
    PasswordReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

pub fn describe_password_policy() -> Vec<&'static str> {
    PASSWORD_RULES.iter().map(|rule| rule.description()).collect()
}
