use serde::{Deserialize, Deserializer, Serialize};

use crate::users::{
    repo_types::User,
    validation::{
        clean_email, normalize_checked, CharField, FieldError, FieldInput, ValidationErrors,
        NAME_MAX_LENGTH, PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH,
    },
};

/// Keeps an explicit `null` apart from an absent field; `#[serde(default)]`
/// covers the absent case.
fn nullable<'de, D>(deserializer: D) -> Result<FieldInput, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Request body for registration and profile updates.
///
/// Every field is optional at the wire level so that a missing or `null`
/// field is reported as a validation error instead of a JSON parse failure.
#[derive(Debug, Default, Deserialize)]
pub struct UserPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub email: FieldInput,
    #[serde(default, deserialize_with = "nullable")]
    pub password: FieldInput,
    #[serde(default, deserialize_with = "nullable")]
    pub name: FieldInput,
}

/// Request body for token issuance.
#[derive(Debug, Default, Deserialize)]
pub struct LoginPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub email: FieldInput,
    #[serde(default, deserialize_with = "nullable")]
    pub password: FieldInput,
}

/// Validated registration data. The password is still plaintext here.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Validated profile changes; `None` leaves the field as it is.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

fn password_field() -> CharField {
    CharField::new()
        .min(PASSWORD_MIN_LENGTH)
        .max(PASSWORD_MAX_LENGTH)
}

fn name_field() -> CharField {
    CharField::new().max(NAME_MAX_LENGTH)
}

impl UserPayload {
    /// Registration and full replacement: all three fields are required.
    pub fn validate_new(self) -> Result<NewUser, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = errors.collect("email", clean_email(self.email));
        let password = errors.collect("password", password_field().clean(self.password));
        let name = errors.collect("name", name_field().clean(self.name));
        match (email, password, name) {
            (Some(email), Some(password), Some(name)) => errors.into_result(NewUser {
                email,
                password,
                name,
            }),
            _ => Err(errors),
        }
    }

    /// Partial update: absent fields are skipped, present ones obey the usual rules.
    pub fn validate_partial(self) -> Result<UserChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut changes = UserChanges::default();
        if self.email.is_some() {
            changes.email = errors.collect("email", clean_email(self.email));
        }
        if self.password.is_some() {
            changes.password = errors.collect("password", password_field().clean(self.password));
        }
        if self.name.is_some() {
            changes.name = errors.collect("name", name_field().clean(self.name));
        }
        errors.into_result(changes)
    }
}

impl From<NewUser> for UserChanges {
    fn from(new: NewUser) -> Self {
        Self {
            email: Some(new.email),
            password: Some(new.password),
            name: Some(new.name),
        }
    }
}

impl LoginPayload {
    /// The password keeps its surrounding whitespace, unlike registration.
    pub fn validate(self) -> Result<Credentials, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = errors.collect("email", clean_email(self.email));
        let password = errors.collect(
            "password",
            CharField::new().keep_whitespace().clean(self.password),
        );
        match (email, password) {
            (Some(email), Some(password)) => errors.into_result(Credentials { email, password }),
            _ => Err(errors),
        }
    }
}

/// Public part of the user returned to the client. Never carries the password.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub email: String,
    pub name: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::validation::ErrorCode;

    fn payload(email: Option<&str>, password: Option<&str>, name: Option<&str>) -> UserPayload {
        UserPayload {
            email: email.map(|v| Some(v.into())),
            password: password.map(|v| Some(v.into())),
            name: name.map(|v| Some(v.into())),
        }
    }

    #[test]
    fn new_user_requires_every_field() {
        let errors = UserPayload::default().validate_new().unwrap_err();
        for field in ["email", "password", "name"] {
            assert_eq!(errors.get(field)[0].code, ErrorCode::Required, "{field}");
        }
    }

    #[test]
    fn new_user_reports_all_bad_fields_together() {
        let errors = payload(Some("nope"), Some("abc"), Some("  "))
            .validate_new()
            .unwrap_err();
        assert_eq!(errors.get("email")[0].code, ErrorCode::Invalid);
        assert_eq!(errors.get("password")[0].code, ErrorCode::MinLength);
        assert_eq!(errors.get("name")[0].code, ErrorCode::Blank);
    }

    #[test]
    fn registration_trims_password() {
        let user = payload(Some(" a@example.com "), Some("  secret  "), Some(" Ann "))
            .validate_new()
            .expect("valid");
        assert_eq!(user.email, "a@example.com");
        assert_eq!(user.password, "secret");
        assert_eq!(user.name, "Ann");
    }

    #[test]
    fn padded_short_password_is_too_short() {
        let errors = payload(Some("a@example.com"), Some("  abc  "), Some("Ann"))
            .validate_new()
            .unwrap_err();
        assert!(!errors.get("password").is_empty());
        assert!(errors.get("email").is_empty());
    }

    #[test]
    fn overlong_password_is_rejected() {
        let long = "x".repeat(PASSWORD_MAX_LENGTH + 1);
        let errors = payload(Some("a@example.com"), Some(&long), Some("Ann"))
            .validate_new()
            .unwrap_err();
        assert_eq!(errors.get("password")[0].code, ErrorCode::MaxLength);
    }

    #[test]
    fn partial_update_accepts_empty_body() {
        let changes = UserPayload::default().validate_partial().expect("valid");
        assert!(changes.email.is_none() && changes.password.is_none() && changes.name.is_none());
    }

    #[test]
    fn partial_update_validates_present_fields_only() {
        let changes = payload(None, Some("newpass"), None)
            .validate_partial()
            .expect("valid");
        assert_eq!(changes.password.as_deref(), Some("newpass"));
        assert!(changes.email.is_none());

        let errors = payload(None, Some("abc"), Some("Bob"))
            .validate_partial()
            .unwrap_err();
        assert!(!errors.get("password").is_empty());
        assert!(errors.get("name").is_empty());
    }

    #[test]
    fn login_keeps_password_whitespace() {
        let creds = LoginPayload {
            email: Some(Some(" a@example.com".into())),
            password: Some(Some("  secret  ".into())),
        }
        .validate()
        .expect("valid");
        assert_eq!(creds.email, "a@example.com");
        assert_eq!(creds.password, "  secret  ");
    }

    #[test]
    fn login_requires_fields() {
        let errors = LoginPayload::default().validate().unwrap_err();
        assert_eq!(errors.get("email")[0].code, ErrorCode::Required);
        assert_eq!(errors.get("password")[0].code, ErrorCode::Required);

        let errors = LoginPayload {
            email: Some(Some("a@example.com".into())),
            password: Some(Some(String::new())),
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.get("password")[0].code, ErrorCode::Blank);
    }

    #[test]
    fn null_is_distinct_from_absent() {
        let payload: UserPayload =
            serde_json::from_value(serde_json::json!({"password": null})).unwrap();
        assert_eq!(payload.password, Some(None));
        assert_eq!(payload.email, None);

        let errors = payload.validate_partial().unwrap_err();
        assert_eq!(errors.get("password")[0].code, ErrorCode::Null);
        assert!(errors.get("email").is_empty());

        let errors = serde_json::from_value::<UserPayload>(serde_json::json!({"name": null}))
            .unwrap()
            .validate_new()
            .unwrap_err();
        assert_eq!(errors.get("name")[0].code, ErrorCode::Null);
        assert_eq!(errors.get("email")[0].code, ErrorCode::Required);
    }

    #[test]
    fn candidate_email_is_normalized() {
        let padded = payload(Some(" Ann@EXAMPLE.com "), None, None);
        assert_eq!(padded.candidate_email().unwrap().unwrap(), "Ann@example.com");
        assert!(UserPayload::default().candidate_email().is_none());
        assert!(payload(Some("nope"), None, None).candidate_email().is_none());
    }

    #[test]
    fn public_user_omits_password() {
        let json = serde_json::to_value(PublicUser {
            email: "a@example.com".into(),
            name: "Ann".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"email": "a@example.com", "name": "Ann"}));
    }
}
