use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{ser::SerializeMap, Serialize, Serializer};

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

pub const EMAIL_MAX_LENGTH: usize = 255;
pub const NAME_MAX_LENGTH: usize = 255;
pub const PASSWORD_MIN_LENGTH: usize = 5;
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Machine-readable reason attached to every validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Required,
    Null,
    Blank,
    Invalid,
    NullCharacters,
    MinLength,
    MaxLength,
    Unique,
    Authorization,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Required => "required",
            ErrorCode::Null => "null",
            ErrorCode::Blank => "blank",
            ErrorCode::Invalid => "invalid",
            ErrorCode::NullCharacters => "null_characters_not_allowed",
            ErrorCode::MinLength => "min_length",
            ErrorCode::MaxLength => "max_length",
            ErrorCode::Unique => "unique",
            ErrorCode::Authorization => "authorization",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub code: ErrorCode,
    pub message: String,
}

/// Errors keyed by field name. Serializes as `{"field": ["message", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<FieldError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, error: FieldError) {
        self.errors.entry(field.to_string()).or_default().push(error);
    }

    pub fn single(field: &str, error: FieldError) -> Self {
        let mut errors = Self::new();
        errors.push(field, error);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> &[FieldError] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Folds the outcome of one field check into the collected errors.
    pub fn collect<T>(&mut self, field: &str, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.push(field, e);
                None
            }
        }
    }

    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<String> = self
            .errors
            .iter()
            .map(|(field, errors)| {
                let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
                format!("{} ({})", field, codes.join(", "))
            })
            .collect();
        write!(f, "invalid fields: {}", fields.join("; "))
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.errors.len()))?;
        for (field, errors) in &self.errors {
            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            map.serialize_entry(field, &messages)?;
        }
        map.end()
    }
}

fn field_error(code: ErrorCode, message: impl Into<String>) -> FieldError {
    FieldError {
        code,
        message: message.into(),
    }
}

/// A field as it arrived on the wire: `None` when absent, `Some(None)` for an
/// explicit JSON `null`.
pub type FieldInput = Option<Option<String>>;

pub(crate) fn too_long(max: usize) -> FieldError {
    field_error(
        ErrorCode::MaxLength,
        format!("Ensure this field has no more than {} characters.", max),
    )
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        // Domain: dot-separated labels that neither start nor end with '-',
        // then an alphabetic or punycode TLD.
        static ref EMAIL_RE: Regex = Regex::new(
            r"(?i)^[^@\s]+@(?:[a-z0-9\x{00a1}-\x{ffff}](?:[a-z0-9\x{00a1}-\x{ffff}-]*[a-z0-9\x{00a1}-\x{ffff}])?\.)+(?:[a-z\x{00a1}-\x{ffff}]{2,}|xn--[a-z0-9]+)$"
        )
        .unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Lowercases the domain part, keeps the local part untouched.
pub fn normalize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// [`normalize_email`] followed by a second length check: lowercasing can
/// lengthen the domain (`'İ'` becomes two chars).
pub(crate) fn normalize_checked(email: &str) -> Result<String, FieldError> {
    let email = normalize_email(email);
    if email.chars().count() > EMAIL_MAX_LENGTH {
        return Err(too_long(EMAIL_MAX_LENGTH));
    }
    Ok(email)
}

/// Text field checks shared by every payload: presence, blankness, length.
pub(crate) struct CharField {
    pub trim_whitespace: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

impl CharField {
    pub fn new() -> Self {
        Self {
            trim_whitespace: true,
            min_length: None,
            max_length: None,
        }
    }

    pub fn min(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn keep_whitespace(mut self) -> Self {
        self.trim_whitespace = false;
        self
    }

    pub fn clean(&self, value: FieldInput) -> Result<String, FieldError> {
        let raw = value
            .ok_or_else(|| field_error(ErrorCode::Required, "This field is required."))?
            .ok_or_else(|| field_error(ErrorCode::Null, "This field may not be null."))?;
        let value = if self.trim_whitespace {
            raw.trim().to_string()
        } else {
            raw
        };
        if value.is_empty() {
            return Err(field_error(ErrorCode::Blank, "This field may not be blank."));
        }
        let len = value.chars().count();
        if let Some(max) = self.max_length {
            if len > max {
                return Err(too_long(max));
            }
        }
        if let Some(min) = self.min_length {
            if len < min {
                return Err(field_error(
                    ErrorCode::MinLength,
                    format!("Ensure this field has at least {} characters.", min),
                ));
            }
        }
        if value.contains('\0') {
            return Err(field_error(
                ErrorCode::NullCharacters,
                "Null characters are not allowed.",
            ));
        }
        Ok(value)
    }
}

pub(crate) fn clean_email(value: FieldInput) -> Result<String, FieldError> {
    let email = CharField::new().max(EMAIL_MAX_LENGTH).clean(value)?;
    if !is_valid_email(&email) {
        return Err(field_error(ErrorCode::Invalid, "Enter a valid email address."));
    }
    Ok(email)
}

pub(crate) fn email_taken() -> FieldError {
    field_error(ErrorCode::Unique, "user with this email already exists.")
}

pub(crate) fn unable_to_authenticate() -> FieldError {
    field_error(
        ErrorCode::Authorization,
        "Unable to authenticate with provided credentials.",
    )
}
