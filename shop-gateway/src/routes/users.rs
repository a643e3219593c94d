//! Account endpoints: registration, profile, login and token refresh.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use shop_core::{NewUser, UserChanges};
use tracing::info;
use validator::{Validate, ValidationError};

use super::nullable;
use crate::{
    error::{GatewayError, FIELD_PARAM},
    extract::{CurrentUser, ValidJson},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/register", post(register))
        .route("/user/profile", get(profile).put(replace_profile).patch(patch_profile))
        .route("/user/login", post(login))
        .route("/user/token/refresh", post(refresh))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterBody {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(
        length(min = 8, message = "Ensure this field has at least 8 characters."),
        must_match(other = "confirm_password", message = "Passwords do not match.")
    )]
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

impl From<RegisterBody> for NewUser {
    fn from(body: RegisterBody) -> Self {
        Self {
            email: body.email,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            phone: body.phone,
        }
    }
}

/// Password confirmation for bodies where both fields are optional: a new
/// password must be repeated exactly in `confirm_password`.
fn passwords_match(password: Option<&str>, confirm: Option<&str>) -> Result<(), ValidationError> {
    match password {
        Some(password) if confirm != Some(password) => {
            let mut err = ValidationError::new("password_mismatch").with_message(Cow::from("Passwords do not match."));
            err.add_param(Cow::from(FIELD_PARAM), &"password");
            Err(err)
        }
        _ => Ok(()),
    }
}

fn profile_passwords_match(body: &ProfileBody) -> Result<(), ValidationError> {
    passwords_match(body.password.as_deref(), body.confirm_password.as_deref())
}

fn patch_passwords_match(body: &ProfilePatch) -> Result<(), ValidationError> {
    passwords_match(body.password.as_deref(), body.confirm_password.as_deref())
}

/// Full profile replacement. The password is optional; when present it
/// must be confirmed.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "profile_passwords_match"))]
pub struct ProfileBody {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

impl From<ProfileBody> for UserChanges {
    fn from(body: ProfileBody) -> Self {
        Self {
            email: Some(body.email),
            password: body.password,
            first_name: Some(body.first_name),
            last_name: Some(body.last_name),
            phone: Some(body.phone),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[validate(schema(function = "patch_passwords_match"))]
pub struct ProfilePatch {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
}

impl From<ProfilePatch> for UserChanges {
    fn from(patch: ProfilePatch) -> Self {
        Self {
            email: patch.email,
            password: patch.password,
            first_name: patch.first_name,
            last_name: patch.last_name,
            phone: patch.phone,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshBody {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
}

/// `POST /user/register`: create an account.
async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let user = state.store.create_user(body.into()).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn profile(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(user)
}

async fn replace_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(body): ValidJson<ProfileBody>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.update_user(user.id, body.into()).await?))
}

async fn patch_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(body): ValidJson<ProfilePatch>,
) -> Result<impl IntoResponse, GatewayError> {
    if body.phone.as_ref().and_then(Option::as_ref).is_some_and(|p| p.chars().count() > 20) {
        return Err(GatewayError::field("phone", "Ensure this field has no more than 20 characters."));
    }
    Ok(Json(state.store.update_user(user.id, body.into()).await?))
}

/// `POST /user/login`: exchange credentials for an access/refresh pair.
async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let user = state.store.verify_credentials(&body.email, &body.password).await?;
    let pair = state.store.issue_tokens(user.id, &state.tokens).await?;
    info!(user_id = user.id.get(), "login");
    Ok(Json(pair))
}

/// `POST /user/token/refresh`: a new access token for a refresh token.
async fn refresh(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RefreshBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let access = state.store.refresh_access(&body.refresh, &state.tokens).await?;
    Ok(Json(AccessToken { access }))
}
