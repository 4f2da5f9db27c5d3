use deadpool_postgres::Pool;

use crate::cache::TtlCache;
use crate::chat::ChatClient;
use crate::db::User;
use crate::fetchers::{Aggregator, Article, PriceRecord, Weather};
use crate::inference::Models;
use crate::session::SessionStore;

/// Everything a request handler needs, built once at startup and shared via
/// `web::Data`. Model handles live here rather than in module-level globals
/// so a request can never observe a half-initialised process.
pub struct AppState {
    pub pool: Pool,
    pub sessions: SessionStore,
    pub user_cache: TtlCache<User>,
    pub weather_cache: TtlCache<Weather>,
    pub news_cache: TtlCache<Vec<Article>>,
    pub price_cache: TtlCache<Vec<PriceRecord>>,
    pub apis: Aggregator,
    pub chat: ChatClient,
    pub models: Models,
}
