pub const DEFAULT_API_URL: &str = "https://api.listenbrainz.org";
pub const DEFAULT_WEB_URL: &str = "https://listenbrainz.org";
pub const DEFAULT_AREA_LOOKUP_URL: &str = "http://bono.metabrainz.org:8000/area-lookup/json";

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub web_url: String,
    pub area_lookup_url: String,
    /// ListenBrainz user token, needed for private data and uploads
    pub token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            web_url: DEFAULT_WEB_URL.to_string(),
            area_lookup_url: DEFAULT_AREA_LOOKUP_URL.to_string(),
            token: None,
        }
    }
}

impl Config {
    /// A non-blank token given on the command line wins over the environment
    pub fn with_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|token| !token.trim().is_empty()) {
            self.token = Some(token);
        }
        self
    }
}

/// Load configuration from `.env` and environment
pub fn load_config() -> Config {
    // Load `.env` file if present
    dotenv::dotenv().ok();
    config_from(|key| std::env::var(key).ok())
}

fn config_from(lookup: impl Fn(&str) -> Option<String>) -> Config {
    let defaults = Config::default();
    Config {
        api_url: lookup("LISTENBRAINZ_API_URL").unwrap_or(defaults.api_url),
        web_url: lookup("LISTENBRAINZ_WEB_URL").unwrap_or(defaults.web_url),
        area_lookup_url: lookup("AREA_LOOKUP_URL").unwrap_or(defaults.area_lookup_url),
        token: lookup("LISTENBRAINZ_TOKEN").filter(|token| !token.trim().is_empty()),
    }
}
