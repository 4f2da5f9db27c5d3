use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sessionid";

/// Chat history held in the session: two parallel ordered sequences, one
/// entry per exchange. History accumulates across turns within a session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatLog {
    pub queries: Vec<String>,
    pub responses: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Session {
    user_id: Option<i64>,
    error_message: Option<String>,
    chatlog: ChatLog,
}

/// Server-side session store keyed by an opaque v4 token.
///
/// Sessions are created lazily and never expire here; lifetime is bounded by
/// the process, which matches the original deployment's in-memory backend.
pub struct SessionStore {
    sessions: DashMap<Uuid, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn create(&self) -> Uuid {
        let token = Uuid::new_v4();
        self.sessions.insert(token, Session::default());
        token
    }

    pub fn contains(&self, token: &Uuid) -> bool {
        self.sessions.contains_key(token)
    }

    pub fn user_id(&self, token: &Uuid) -> Option<i64> {
        self.sessions.get(token).and_then(|s| s.user_id)
    }

    pub fn log_in(&self, token: &Uuid, user_id: i64) {
        if let Some(mut session) = self.sessions.get_mut(token) {
            session.user_id = Some(user_id);
        }
    }

    /// Clears the logged-in user. Returns `false` if the session was not
    /// logged in to begin with.
    pub fn log_out(&self, token: &Uuid) -> bool {
        match self.sessions.get_mut(token) {
            Some(mut session) => session.user_id.take().is_some(),
            None => false,
        }
    }

    pub fn set_error_message(&self, token: &Uuid, message: &str) {
        if let Some(mut session) = self.sessions.get_mut(token) {
            session.error_message = Some(message.to_string());
        }
    }

    /// One-shot read: the stored message is removed as it is returned, so the
    /// error page consumes it exactly once.
    pub fn take_error_message(&self, token: &Uuid) -> Option<String> {
        self.sessions
            .get_mut(token)
            .and_then(|mut s| s.error_message.take())
    }

    /// Appends one exchange to the session's chat log and returns the updated
    /// log for rendering.
    pub fn append_chat_turn(&self, token: &Uuid, query: String, response: String) -> ChatLog {
        match self.sessions.get_mut(token) {
            Some(mut session) => {
                session.chatlog.queries.push(query);
                session.chatlog.responses.push(response);
                session.chatlog.clone()
            }
            None => ChatLog::default(),
        }
    }

    pub fn chatlog(&self, token: &Uuid) -> ChatLog {
        self.sessions
            .get(token)
            .map(|s| s.chatlog.clone())
            .unwrap_or_default()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_logout_cycle() {
        let store = SessionStore::new();
        let token = store.create();

        assert_eq!(store.user_id(&token), None);

        store.log_in(&token, 7);
        assert_eq!(store.user_id(&token), Some(7));

        assert!(store.log_out(&token));
        assert_eq!(store.user_id(&token), None);

        // A second logout has nothing to clear.
        assert!(!store.log_out(&token));
    }

    #[test]
    fn test_unknown_token_is_not_a_session() {
        let store = SessionStore::new();
        let token = Uuid::new_v4();

        assert!(!store.contains(&token));
        assert_eq!(store.user_id(&token), None);
        assert!(!store.log_out(&token));
    }

    #[test]
    fn test_error_message_is_consumed_once() {
        let store = SessionStore::new();
        let token = store.create();

        store.set_error_message(&token, "Please Login to Continue");
        assert_eq!(
            store.take_error_message(&token),
            Some("Please Login to Continue".to_string())
        );
        assert_eq!(store.take_error_message(&token), None);
    }

    #[test]
    fn test_chat_history_accumulates_across_turns() {
        let store = SessionStore::new();
        let token = store.create();

        store.append_chat_turn(&token, "first?".to_string(), "one".to_string());
        let log = store.append_chat_turn(&token, "second?".to_string(), "two".to_string());

        assert_eq!(log.queries, vec!["first?", "second?"]);
        assert_eq!(log.responses, vec!["one", "two"]);
        assert_eq!(store.chatlog(&token).queries.len(), 2);
    }
}
