use rand::{rngs::OsRng, RngCore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    users::{
        dto::{Credentials, LoginPayload, NewUser, UserChanges, UserPayload},
        password::{hash_password, verify_password},
        repo::{TokenStore, UserStore},
        repo_types::{AuthToken, User},
        validation::{
            email_taken, normalize_checked, unable_to_authenticate, FieldError,
            ValidationErrors, NON_FIELD_ERRORS,
        },
    },
};

const TOKEN_BYTES: usize = 20;

/// 40 lowercase hex characters from the OS RNG.
pub fn generate_key() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Email checks that need the normalized value or the store. They run next
/// to the field rules so every problem is reported in one response.
async fn check_email(
    users: &dyn UserStore,
    payload: &UserPayload,
    current: Option<Uuid>,
) -> ApiResult<Option<FieldError>> {
    let email = match payload.candidate_email() {
        None => return Ok(None),
        Some(Err(e)) => return Ok(Some(e)),
        Some(Ok(email)) => email,
    };
    match users.find_by_email(&email).await? {
        Some(existing) if Some(existing.id) != current => {
            warn!(email = %email, "email already registered");
            Ok(Some(email_taken()))
        }
        _ => Ok(None),
    }
}

fn with_email_error<T>(
    checked: Result<T, ValidationErrors>,
    email_error: Option<FieldError>,
) -> ApiResult<T> {
    let Some(email_error) = email_error else {
        return Ok(checked?);
    };
    let mut errors = checked.err().unwrap_or_default();
    errors.push("email", email_error);
    Err(errors.into())
}

/// Registration and full replacement. `current` is the user being replaced,
/// whose own email does not count as taken.
pub async fn validate_new_user(
    users: &dyn UserStore,
    payload: UserPayload,
    current: Option<Uuid>,
) -> ApiResult<NewUser> {
    let email_error = check_email(users, &payload, current).await?;
    with_email_error(payload.validate_new(), email_error)
}

/// Partial update of `current`.
pub async fn validate_user_changes(
    users: &dyn UserStore,
    payload: UserPayload,
    current: Uuid,
) -> ApiResult<UserChanges> {
    let email_error = check_email(users, &payload, Some(current)).await?;
    with_email_error(payload.validate_partial(), email_error)
}

fn normalized(email: &str) -> ApiResult<String> {
    normalize_checked(email).map_err(|e| ValidationErrors::single("email", e).into())
}

/// Hashes and replaces the stored password. Does not persist.
pub fn set_password(user: &mut User, raw: &str) -> anyhow::Result<()> {
    user.password_hash = hash_password(raw)?;
    Ok(())
}

/// Creates a user with a hashed password.
pub async fn create_user(users: &dyn UserStore, new: NewUser) -> ApiResult<User> {
    let email = normalized(&new.email)?;
    let hash = hash_password(&new.password)?;
    let user = users.insert_user(&email, &hash, &new.name).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Applies field changes; a new password goes through [`set_password`] rather
/// than plain assignment.
pub async fn update_user(
    users: &dyn UserStore,
    mut user: User,
    changes: UserChanges,
) -> ApiResult<User> {
    let UserChanges {
        email,
        password,
        name,
    } = changes;

    if let Some(email) = email {
        user.email = normalized(&email)?;
    }
    if let Some(name) = name {
        user.name = name;
    }

    let password_changed = password.is_some();
    if let Some(password) = password {
        set_password(&mut user, &password)?;
    }

    let saved = users.save_user(&user).await?;
    info!(user_id = %saved.id, password_changed, "user updated");
    Ok(saved)
}

/// Returns the active user matching the credentials, if any.
pub async fn authenticate(users: &dyn UserStore, creds: &Credentials) -> ApiResult<Option<User>> {
    let Some(user) = users.find_by_email(&creds.email).await? else {
        // Hash anyway so unknown emails take as long as wrong passwords.
        hash_password(&creds.password)?;
        return Ok(None);
    };

    if !verify_password(&creds.password, &user.password_hash)? || !user.is_active {
        return Ok(None);
    }
    Ok(Some(user))
}

/// Validates a login payload and resolves it to a user.
pub async fn login(users: &dyn UserStore, payload: LoginPayload) -> ApiResult<User> {
    let creds = payload.validate()?;
    match authenticate(users, &creds).await? {
        Some(user) => {
            info!(user_id = %user.id, "user logged in");
            Ok(user)
        }
        None => {
            warn!(email = %creds.email, "login rejected");
            Err(ValidationErrors::single(NON_FIELD_ERRORS, unable_to_authenticate()).into())
        }
    }
}

/// Returns the user's token, creating it on first use.
pub async fn obtain_token(tokens: &dyn TokenStore, user: &User) -> ApiResult<AuthToken> {
    let token = tokens.get_or_create_token(user.id, &generate_key()).await?;
    debug!(user_id = %user.id, issued_at = %token.created_at, "auth token issued");
    Ok(token)
}

/// Resolves a presented token key to its active owner.
pub async fn user_for_token(
    users: &dyn UserStore,
    tokens: &dyn TokenStore,
    key: &str,
) -> ApiResult<User> {
    let token = tokens
        .find_token(key)
        .await?
        .ok_or(ApiError::InvalidToken("Invalid token."))?;

    users
        .find_by_id(token.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or(ApiError::InvalidToken("User inactive or deleted."))
}
