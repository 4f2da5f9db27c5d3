use std::env;
use std::path::PathBuf;

/// Runtime configuration, read once at startup from the environment
/// (a `.env` file is loaded beforehand in `main`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: String,
    pub database_url: String,
    pub weather_api_key: String,
    pub news_api_key: String,
    pub govdata_api_key: String,
    pub gemini_api_key: String,
    pub weather_api_url: String,
    pub news_api_url: String,
    pub govdata_api_url: String,
    pub gemini_api_url: String,
    pub crop_model_path: PathBuf,
    pub fertilizer_model_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: "8080".to_string(),
            database_url: String::new(),
            weather_api_key: String::new(),
            news_api_key: String::new(),
            govdata_api_key: String::new(),
            gemini_api_key: String::new(),
            weather_api_url: "http://api.weatherapi.com/v1/current.json".to_string(),
            news_api_url: "https://newsapi.org/v2/everything".to_string(),
            govdata_api_url:
                "https://api.data.gov.in/resource/9ef84268-d588-465a-a308-a864a43d0070"
                    .to_string(),
            gemini_api_url:
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:streamGenerateContent"
                    .to_string(),
            crop_model_path: PathBuf::from("model_code/crop_recommend.json"),
            fertilizer_model_path: PathBuf::from("model_code/fertilizer.json"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let config = Config {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT").unwrap_or(defaults.port),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            weather_api_key: env::var("WEATHER_API_KEY").unwrap_or_default(),
            news_api_key: env::var("NEWSAPI_API_KEY").unwrap_or_default(),
            govdata_api_key: env::var("GOVDATA_API_KEY").unwrap_or_default(),
            gemini_api_key: env::var("GOOGLE_GEMINI_API_KEY").unwrap_or_default(),
            weather_api_url: env::var("WEATHER_API_URL").unwrap_or(defaults.weather_api_url),
            news_api_url: env::var("NEWSAPI_API_URL").unwrap_or(defaults.news_api_url),
            govdata_api_url: env::var("GOVDATA_API_URL").unwrap_or(defaults.govdata_api_url),
            gemini_api_url: env::var("GOOGLE_GEMINI_API_URL").unwrap_or(defaults.gemini_api_url),
            crop_model_path: env::var("CROP_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.crop_model_path),
            fertilizer_model_path: env::var("FERTILIZER_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.fertilizer_model_path),
        };

        for (name, value) in [
            ("WEATHER_API_KEY", &config.weather_api_key),
            ("NEWSAPI_API_KEY", &config.news_api_key),
            ("GOVDATA_API_KEY", &config.govdata_api_key),
            ("GOOGLE_GEMINI_API_KEY", &config.gemini_api_key),
        ] {
            if value.is_empty() {
                log::warn!("{name} is not set; the dependent upstream calls will fail");
            }
        }

        config
    }
}
