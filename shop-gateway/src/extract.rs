//! Request extractors: signed-in users and validated JSON bodies.

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use shop_core::User;
use shop_store::StoreError;
use validator::Validate;

use crate::{error::GatewayError, session::Authenticated, state::AppState};

/// The signed-in user. Rejects anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(Authenticated(id)) = parts.extensions.get::<Authenticated>().copied() else {
            return Err(GatewayError::Unauthenticated);
        };
        match state.store.get_user(id).await {
            Ok(user) => Ok(Self(user)),
            Err(StoreError::NotFound { .. }) => Err(GatewayError::Unauthenticated),
            Err(e) => Err(e.into()),
        }
    }
}

/// A signed-in staff member. Rejects other users with 403.
#[derive(Debug, Clone)]
pub struct StaffUser(pub User);

impl FromRequestParts<AppState> for StaffUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(GatewayError::Forbidden);
        }
        Ok(Self(user))
    }
}

/// A JSON body that passed its `validator` rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| GatewayError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}
