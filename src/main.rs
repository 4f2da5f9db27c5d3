use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;

use kheti_api::app_state::AppState;
use kheti_api::cache::TtlCache;
use kheti_api::chat::ChatClient;
use kheti_api::config::Config;
use kheti_api::db;
use kheti_api::fetchers::Aggregator;
use kheti_api::handlers::{
    check_my_listings, crop_prices_page, croprec_page, croprec_submit, delete_listing, e404_page,
    fertrec_page, fertrec_submit, forum, heartbeat, help_page, help_submit, home_page, list_page,
    list_submit, logout_view, news_page, profile_page,
};
use kheti_api::inference::Models;
use kheti_api::logging::setup_logger;
use kheti_api::session::SessionStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    setup_logger();

    let config = Config::from_env();
    let bind_address = format!("{}:{}", config.host, config.port);

    let pool = db::create_pool(&config.database_url);
    let models = Models::load(&config);
    log::info!(
        "Crop model loaded: {}; fertilizer model loaded: {}",
        models.crop.is_some(),
        models.fertilizer.is_some()
    );

    let state = web::Data::new(AppState {
        pool,
        sessions: SessionStore::new(),
        user_cache: TtlCache::new(),
        weather_cache: TtlCache::new(),
        news_cache: TtlCache::new(),
        price_cache: TtlCache::new(),
        apis: Aggregator::new(&config),
        chat: ChatClient::new(&config),
        models,
    });

    log::info!("Starting server at http://{bind_address}");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            // HEALTH
            .service(heartbeat)
            // ERROR PAGE
            .service(e404_page)
            // DASHBOARD
            .service(home_page)
            .service(forum)
            .service(news_page)
            .service(crop_prices_page)
            .service(profile_page)
            .service(logout_view)
            // RECOMMENDERS
            .service(croprec_page)
            .service(croprec_submit)
            .service(fertrec_page)
            .service(fertrec_submit)
            // CHAT HELPER
            .service(help_page)
            .service(help_submit)
            // MARKET LISTINGS
            .service(list_page)
            .service(list_submit)
            .service(check_my_listings)
            .service(delete_listing)
    })
    .bind(&bind_address)?
    .run()
    .await
}
