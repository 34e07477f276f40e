use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub public_rps: u32,
    pub api_rps: u32,
    /// Base of the link mailed to invited guests; the token is appended as `?token=`.
    pub invitation_base_url: Url,
    pub mail_relay_url: Option<String>,
    pub mail_relay_secret: Option<String>,
    pub log_json: bool,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let invitation_base_url = {
            let raw = get_env("INVITATION_BASE_URL")?;
            Url::parse(&raw).map_err(|e| {
                Error::Config(format!("Invalid value for INVITATION_BASE_URL: {}", e))
            })?
        };

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
            jwt_secret: get_env("JWT_SECRET")?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            api_rps: get_env_parse("API_RPS")?,
            invitation_base_url,
            mail_relay_url: env::var("MAIL_RELAY_URL").ok().filter(|v| !v.trim().is_empty()),
            mail_relay_secret: env::var("MAIL_RELAY_SECRET").ok(),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    pub fn invitation_link(&self, token: &str) -> String {
        let mut link = self.invitation_base_url.clone();
        link.query_pairs_mut().append_pair("token", token);
        link.to_string()
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(_) => get_env_parse(name),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invitation_link_appends_token_query() {
        let config = Config {
            server_address: "127.0.0.1:0".into(),
            database_url: "postgres://localhost/test".into(),
            database_max_connections: 5,
            jwt_secret: "secret".into(),
            public_rps: 10,
            api_rps: 10,
            invitation_base_url: Url::parse("https://quiz.example.com/take-quiz").unwrap(),
            mail_relay_url: None,
            mail_relay_secret: None,
            log_json: false,
        };
        assert_eq!(
            config.invitation_link("abc123"),
            "https://quiz.example.com/take-quiz?token=abc123"
        );
    }
}
