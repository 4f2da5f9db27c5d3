use std::time::Duration;
use thiserror::Error;

use crate::app_state::AppState;
use crate::db::{self, User};

const USER_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("user with id {0} not found")]
    NotFound(i64),
    #[error("database error: {0}")]
    Db(String),
}

/// Resolves a session-held user id to the full user record through the
/// `user_{id}` cache. Within the TTL window a repeated resolution never
/// touches the database. A missing session id is the caller's "not logged
/// in" condition, not handled here.
pub async fn resolve_user(state: &AppState, id: i64) -> Result<User, IdentityError> {
    let cache_key = format!("user_{id}");
    if let Some(user) = state.user_cache.get(&cache_key) {
        return Ok(user);
    }

    let client = state
        .pool
        .get()
        .await
        .map_err(|e| IdentityError::Db(e.to_string()))?;

    match db::get_user_by_id(&client, id).await {
        Ok(Some(user)) => {
            state.user_cache.insert(cache_key, user.clone(), USER_TTL);
            Ok(user)
        }
        Ok(None) => {
            log::error!("User with id {id} not found");
            Err(IdentityError::NotFound(id))
        }
        Err(e) => Err(IdentityError::Db(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::chat::ChatClient;
    use crate::config::Config;
    use crate::fetchers::Aggregator;
    use crate::inference::Models;
    use crate::session::SessionStore;
    use deadpool_postgres::Runtime;
    use tokio_postgres::NoTls;

    fn state_without_database() -> AppState {
        // An unconfigured pool: any checkout attempt fails, which proves the
        // cache-hit path below never reaches the database.
        let mut pg = deadpool_postgres::Config::new();
        pg.dbname = Some("test".to_string());
        let pool = pg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .expect("Failed to create pool");
        let config = Config::default();
        AppState {
            pool,
            sessions: SessionStore::new(),
            user_cache: TtlCache::new(),
            weather_cache: TtlCache::new(),
            news_cache: TtlCache::new(),
            price_cache: TtlCache::new(),
            apis: Aggregator::new(&config),
            chat: ChatClient::new(&config),
            models: Models::default(),
        }
    }

    fn sample_user(id: i64) -> User {
        User {
            id,
            name: "Asha".to_string(),
            phone: "9000000000".to_string(),
            state: "Kerala".to_string(),
            district: "Idukki".to_string(),
            lat: 9.85,
            lon: 76.97,
        }
    }

    #[tokio::test]
    async fn test_warm_cache_resolution_skips_database() {
        let state = state_without_database();
        state.user_cache.insert(
            "user_7".to_string(),
            sample_user(7),
            Duration::from_secs(300),
        );

        let user = resolve_user(&state, 7).await.expect("cached user resolves");
        assert_eq!(user.id, 7);
        assert_eq!(user.name, "Asha");
    }

    #[tokio::test]
    async fn test_cold_cache_without_database_is_a_db_error() {
        let state = state_without_database();

        let err = resolve_user(&state, 7).await.unwrap_err();
        assert!(matches!(err, IdentityError::Db(_)));
    }

    #[tokio::test]
    async fn test_cache_key_is_namespaced_by_id() {
        let state = state_without_database();
        state.user_cache.insert(
            "user_7".to_string(),
            sample_user(7),
            Duration::from_secs(300),
        );

        // A different id must not read user 7's entry.
        let err = resolve_user(&state, 8).await.unwrap_err();
        assert!(matches!(err, IdentityError::Db(_)));
    }
}
