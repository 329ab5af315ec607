//! Bearer tokens: opaque strings issued to a user and presented on every
//! subsequent connection in place of re-authenticating.
//!
//! Authentication beyond opaque bearer tokens is explicitly out of scope
//! (spec.md §1 non-goals) — there is no pluggable identity-provider hook
//! here, unlike the teacher crate's `Authenticator` trait. The framework
//! mints and validates its own tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use arcforge_protocol::UserId;
use arcforge_store::{token_key, user_key, CommitRequest, Mutation, Precondition, Store};
use rand::Rng;

use crate::error::SessionError;
use crate::types::{Token, User};

/// Default token lifetime, per spec.md §4.6.
pub const DEFAULT_TOKEN_TTL_DAYS: u64 = 30;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as u64
}

fn generate_bearer_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Issues a fresh token for `user_id` with the given TTL (in days).
pub async fn issue_token(
    store: &Store,
    user_id: UserId,
    ttl_days: u64,
) -> Result<Token, SessionError> {
    let expires_at_ms = now_ms() + ttl_days * 24 * 60 * 60 * 1000;
    loop {
        let token_id = generate_bearer_token();
        let token = Token {
            token_id: token_id.clone(),
            user_id: user_id.clone(),
            expires_at_ms,
        };

        let result = store
            .commit(
                CommitRequest::new()
                    .require(Precondition::absent(token_key(&token_id)))
                    .write(Mutation::Put(
                        token_key(&token_id),
                        serde_json::to_vec(&token).map_err(arcforge_store::StoreError::Encode)?,
                    )),
            )
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(arcforge_store::StoreError::Conflict(_)) => continue,
            Err(other) => return Err(other.into()),
        }
    }
}

/// Resolves a bearer token string to its token record and user, strictly
/// rejecting expired tokens (spec.md §5: "tokens expire strictly").
pub async fn resolve_token(store: &Store, token_id: &str) -> Result<(Token, User), SessionError> {
    let (token, _version) = store
        .get::<Token>(&token_key(token_id))
        .await?
        .ok_or(SessionError::TokenNotFound)?;

    if token.is_expired(now_ms()) {
        return Err(SessionError::TokenExpired);
    }

    let (user, _version) = store
        .get::<User>(&user_key(token.user_id.as_str()))
        .await?
        .ok_or_else(|| SessionError::UserNotFound(token.user_id.clone()))?;

    Ok((token, user))
}
