use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_state::AppState;
use crate::config::Config;

/// States polled for mandi prices, one request per state.
const STATES: [&str; 12] = [
    "Kerala",
    "Uttrakhand",
    "Uttar Pradesh",
    "Rajasthan",
    "Nagaland",
    "Gujarat",
    "Maharashtra",
    "Tripura",
    "Punjab",
    "Bihar",
    "Telangana",
    "Meghalaya",
];

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const NEWS_LIMIT: usize = 20;

const WEATHER_TTL: Duration = Duration::from_secs(3600);
const NEWS_TTL: Duration = Duration::from_secs(86400);
const PRICES_TTL: Duration = Duration::from_secs(3600);

/// Current conditions at a farmer's coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Weather {
    pub condition: String,
    pub temp_c: f64,
    pub humidity: f64,
    pub wind_kph: f64,
    pub pressure_mb: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    current: Option<CurrentConditions>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    condition: Condition,
    temp_c: f64,
    humidity: f64,
    wind_kph: f64,
    pressure_mb: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: String,
}

/// One agriculture news article as returned upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "urlToImage")]
    pub url_to_image: Option<String>,
    #[serde(default, rename = "publishedAt")]
    pub published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

/// One mandi price record. The upstream dataset serves every field as text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub commodity: String,
    #[serde(default)]
    pub variety: String,
    #[serde(default)]
    pub arrival_date: String,
    #[serde(default)]
    pub min_price: String,
    #[serde(default)]
    pub max_price: String,
    #[serde(default)]
    pub modal_price: String,
}

#[derive(Debug, Deserialize)]
struct GovDataResponse {
    #[serde(default)]
    records: Vec<PriceRecord>,
}

/// Clients for the three upstream data services. Every failure is logged and
/// degraded to the operation's empty value; nothing here ever raises to a
/// handler.
pub struct Aggregator {
    http: reqwest::Client,
    weather_api_url: String,
    news_api_url: String,
    govdata_api_url: String,
    weather_api_key: String,
    news_api_key: String,
    govdata_api_key: String,
}

impl Aggregator {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("Failed to build upstream HTTP client");

        Self {
            http,
            weather_api_url: config.weather_api_url.clone(),
            news_api_url: config.news_api_url.clone(),
            govdata_api_url: config.govdata_api_url.clone(),
            weather_api_key: config.weather_api_key.clone(),
            news_api_key: config.news_api_key.clone(),
            govdata_api_key: config.govdata_api_key.clone(),
        }
    }

    /// Current weather at `(lat, lon)`, or `None` on any transport error or
    /// unexpected response shape.
    pub async fn weather(&self, coords: (f64, f64)) -> Option<Weather> {
        let (lat, lon) = coords;
        let location = format!("{lat},{lon}");
        let result = self
            .http
            .get(&self.weather_api_url)
            .query(&[
                ("key", self.weather_api_key.as_str()),
                ("q", location.as_str()),
                ("aqi", "no"),
            ])
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("Network error in weather fetch: {e}");
                return None;
            }
        };

        match resp.json::<WeatherResponse>().await {
            Ok(body) => parse_weather(body),
            Err(e) => {
                log::error!("Unexpected response format in weather fetch: {e}");
                None
            }
        }
    }

    /// Latest agriculture headlines, truncated to the first 20; empty on
    /// failure.
    pub async fn news(&self) -> Vec<Article> {
        let result = self
            .http
            .get(&self.news_api_url)
            .query(&[
                ("q", "agriculture"),
                ("apiKey", self.news_api_key.as_str()),
            ])
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("Network error in news fetch: {e}");
                return Vec::new();
            }
        };

        match resp.json::<NewsResponse>().await {
            Ok(body) => {
                let mut articles = body.articles;
                articles.truncate(NEWS_LIMIT);
                articles
            }
            Err(e) => {
                log::error!("Unexpected response format in news fetch: {e}");
                Vec::new()
            }
        }
    }

    /// Mandi prices across all configured states, concatenated. A failing
    /// state is logged and skipped; the others still contribute.
    pub async fn prices_all_states(&self) -> Vec<PriceRecord> {
        let mut records = Vec::new();

        for state in STATES {
            let url = format!(
                "{}?api-key={}&format=json&filters%5Bstate%5D={}",
                self.govdata_api_url,
                self.govdata_api_key,
                encode_state(state)
            );

            let result = self
                .http
                .get(&url)
                .send()
                .await
                .and_then(|resp| resp.error_for_status());

            let resp = match result {
                Ok(resp) => resp,
                Err(e) => {
                    log::error!("Network error in prices fetch ({state}): {e}");
                    continue;
                }
            };

            match resp.json::<GovDataResponse>().await {
                Ok(body) => records.extend(body.records),
                Err(e) => {
                    log::error!("Unexpected response format in prices fetch ({state}): {e}");
                }
            }
        }

        records
    }
}

fn parse_weather(body: WeatherResponse) -> Option<Weather> {
    if let Some(err) = body.error {
        log::error!("Weather API error: {err}");
        return None;
    }
    let current = match body.current {
        Some(current) => current,
        None => {
            log::error!("Unexpected response format in weather fetch: missing 'current'");
            return None;
        }
    };
    Some(Weather {
        condition: current.condition.text,
        temp_c: current.temp_c,
        humidity: current.humidity,
        wind_kph: current.wind_kph,
        pressure_mb: current.pressure_mb,
    })
}

fn encode_state(state: &str) -> String {
    state.replace(' ', "+")
}

pub fn weather_cache_key(coords: (f64, f64)) -> String {
    format!("weather_{},{}", coords.0, coords.1)
}

/// Read-through weather lookup under `weather_{coords}`. Failed fetches are
/// not cached, so the next request retries.
pub async fn cached_weather(state: &AppState, coords: (f64, f64)) -> Option<Weather> {
    let key = weather_cache_key(coords);
    if let Some(weather) = state.weather_cache.get(&key) {
        return Some(weather);
    }
    let fetched = state.apis.weather(coords).await;
    if let Some(weather) = &fetched {
        state.weather_cache.insert(key, weather.clone(), WEATHER_TTL);
    }
    fetched
}

/// Read-through news lookup under the fixed `agro_news` key.
pub async fn cached_news(state: &AppState) -> Vec<Article> {
    if let Some(news) = state.news_cache.get("agro_news") {
        return news;
    }
    let fetched = state.apis.news().await;
    if !fetched.is_empty() {
        state
            .news_cache
            .insert("agro_news".to_string(), fetched.clone(), NEWS_TTL);
    }
    fetched
}

/// Read-through price lookup under `prices_{user_id}`.
pub async fn cached_prices(state: &AppState, user_id: i64) -> Vec<PriceRecord> {
    let key = format!("prices_{user_id}");
    if let Some(prices) = state.price_cache.get(&key) {
        return prices;
    }
    let fetched = state.apis.prices_all_states().await;
    if !fetched.is_empty() {
        state.price_cache.insert(key, fetched.clone(), PRICES_TTL);
    }
    fetched
}
