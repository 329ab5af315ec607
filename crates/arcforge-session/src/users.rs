//! User records: creation, lookup, and the username-uniqueness index.
//!
//! Usernames are globally unique and the index (`usersByUsername/{name}`)
//! must always agree bidirectionally with the user records (spec.md §8).
//! Every mutation here keeps both sides of that index in the same atomic
//! commit as the record it protects.

use arcforge_protocol::{Player, UserId};
use arcforge_store::{user_key, username_index_key, CommitRequest, Mutation, Precondition, Store};

use crate::error::SessionError;
use crate::types::User;

/// Looks up a user by id. `None` if no such user exists.
pub async fn get_user(store: &Store, user_id: &UserId) -> Result<Option<User>, SessionError> {
    Ok(store
        .get::<User>(&user_key(user_id.as_str()))
        .await?
        .map(|(user, _version)| user))
}

/// Creates a brand-new guest user with a freshly minted id and a random
/// `guest-NNNNN` username, retrying with a new username on the rare
/// collision. Guests never collide on user id (ids come from
/// [`arcforge_store::IdGenerator`]), only potentially on username.
pub async fn create_guest_user(
    store: &Store,
    id_gen: &arcforge_store::IdGenerator,
) -> Result<User, SessionError> {
    loop {
        let user_id = UserId::new(id_gen.generate());
        let username = format!("guest-{:05}", rand::random::<u32>() % 100_000);
        let player = Player {
            username: username.clone(),
            is_guest: true,
        };
        let user = User::new(user_id.clone(), player);

        let result = store
            .commit(
                CommitRequest::new()
                    .require(Precondition::absent(user_key(user_id.as_str())))
                    .require(Precondition::absent(username_index_key(&username)))
                    .write(Mutation::Put(
                        user_key(user_id.as_str()),
                        serde_json::to_vec(&user).map_err(arcforge_store::StoreError::Encode)?,
                    ))
                    .write(Mutation::Put(
                        username_index_key(&username),
                        serde_json::to_vec(&user_id).map_err(arcforge_store::StoreError::Encode)?,
                    )),
            )
            .await;

        match result {
            Ok(_) => return Ok(user),
            Err(arcforge_store::StoreError::Conflict(_)) => continue,
            Err(other) => return Err(other.into()),
        }
    }
}

/// Renames a user, per spec.md §4.4's `UpdateUsername`: silently does
/// nothing if the name is unchanged or already taken by someone else.
pub async fn rename_user(
    store: &Store,
    user_id: &UserId,
    new_username: &str,
) -> Result<(), SessionError> {
    loop {
        let (user, version) = get_user_with_version(store, user_id).await?;

        if user.player.username == new_username {
            return Ok(());
        }
        if store
            .get_raw(&username_index_key(new_username))
            .await
            .is_some()
        {
            return Ok(());
        }

        let mut updated = user.clone();
        updated.player.username = new_username.to_string();

        let result = store
            .commit(
                CommitRequest::new()
                    .require(Precondition::version(user_key(user_id.as_str()), version))
                    .require(Precondition::absent(username_index_key(new_username)))
                    .write(Mutation::Delete(username_index_key(&user.player.username)))
                    .write(Mutation::Put(
                        username_index_key(new_username),
                        serde_json::to_vec(user_id).map_err(arcforge_store::StoreError::Encode)?,
                    ))
                    .write(Mutation::Put(
                        user_key(user_id.as_str()),
                        serde_json::to_vec(&updated).map_err(arcforge_store::StoreError::Encode)?,
                    )),
            )
            .await;

        match result {
            Ok(_) => return Ok(()),
            Err(arcforge_store::StoreError::Conflict(_)) => continue,
            Err(other) => return Err(other.into()),
        }
    }
}

async fn get_user_with_version(
    store: &Store,
    user_id: &UserId,
) -> Result<(User, arcforge_store::Versionstamp), SessionError> {
    store
        .get::<User>(&user_key(user_id.as_str()))
        .await?
        .ok_or_else(|| SessionError::UserNotFound(user_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcforge_store::IdGenerator;

    #[tokio::test]
    async fn test_create_guest_user_has_guest_username() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let user = create_guest_user(&store, &id_gen).await.unwrap();
        assert!(user.player.username.starts_with("guest-"));
        assert!(user.player.is_guest);
    }

    #[tokio::test]
    async fn test_create_guest_user_writes_username_index() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let user = create_guest_user(&store, &id_gen).await.unwrap();

        let (indexed_id, _): (UserId, _) = store
            .get(&username_index_key(&user.player.username))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(indexed_id, user.user_id);
    }

    #[tokio::test]
    async fn test_rename_user_updates_record_and_index() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let user = create_guest_user(&store, &id_gen).await.unwrap();

        rename_user(&store, &user.user_id, "newname").await.unwrap();

        let renamed = get_user(&store, &user.user_id).await.unwrap().unwrap();
        assert_eq!(renamed.player.username, "newname");
        assert!(store
            .get_raw(&username_index_key(&user.player.username))
            .await
            .is_none());
        assert!(store.get_raw(&username_index_key("newname")).await.is_some());
    }

    #[tokio::test]
    async fn test_rename_user_is_noop_when_unchanged() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let user = create_guest_user(&store, &id_gen).await.unwrap();
        let username = user.player.username.clone();

        rename_user(&store, &user.user_id, &username).await.unwrap();

        assert!(store.get_raw(&username_index_key(&username)).await.is_some());
    }

    #[tokio::test]
    async fn test_rename_user_is_noop_when_taken() {
        let store = Store::new();
        let id_gen = IdGenerator::new();
        let u1 = create_guest_user(&store, &id_gen).await.unwrap();
        let u2 = create_guest_user(&store, &id_gen).await.unwrap();

        rename_user(&store, &u1.user_id, &u2.player.username).await.unwrap();

        let unchanged = get_user(&store, &u1.user_id).await.unwrap().unwrap();
        assert_eq!(unchanged.player.username, u1.player.username);
    }
}
