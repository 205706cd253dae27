use std::{env, fmt, fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{errors::Error, Result};

/// A long-running entry point the binary can start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Listener {
    Api,
    Driver,
    Admin,
}

impl Listener {
    pub const ALL: [Listener; 3] = [Listener::Api, Listener::Driver, Listener::Admin];

    pub fn name(self) -> &'static str {
        match self {
            Listener::Api => "api",
            Listener::Driver => "driver-bot",
            Listener::Admin => "admin-bot",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "api" | "http" => Some(Listener::Api),
            "driver" | "driver-bot" | "driver_bot" => Some(Listener::Driver),
            "admin" | "admin-bot" | "admin_bot" => Some(Listener::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed process configuration.
///
/// Sources, lowest precedence first: `.env` (never overrides the real
/// environment), the YAML file named by `GRUZ_CONFIG` (default `config.yaml`,
/// optional), then environment variables.
#[derive(Clone)]
pub struct Config {
    // Storage
    pub database_url: String,
    pub db_max_connections: u32,

    // HTTP
    pub http_port: u16,

    // Bots
    pub driver_bot_token: Option<String>,
    pub admin_bot_token: Option<String>,
    pub admin_ids: Vec<i64>,
    pub conversation_ttl: Duration,

    // Runtime
    pub listeners: Vec<Listener>,
    pub shutdown_timeout: Duration,
    pub log_json: bool,
    pub env: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secrets stay out of logs.
        f.debug_struct("Config")
            .field("database_url", &"<redacted>")
            .field("db_max_connections", &self.db_max_connections)
            .field("http_port", &self.http_port)
            .field("driver_bot_token", &self.driver_bot_token.as_ref().map(|_| "<redacted>"))
            .field("admin_bot_token", &self.admin_bot_token.as_ref().map(|_| "<redacted>"))
            .field("admin_ids", &self.admin_ids)
            .field("conversation_ttl", &self.conversation_ttl)
            .field("listeners", &self.listeners)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("log_json", &self.log_json)
            .field("env", &self.env)
            .finish()
    }
}

/// Shape of the optional YAML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub database: DatabaseSection,
    pub server: ServerSection,
    pub bots: BotsSection,
    pub listeners: Option<Vec<String>>,
    pub env: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: Option<Port>,
    pub shutdown_timeout_secs: Option<u64>,
}

/// `port: 8080` and `port: "8080"` are both accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Port {
    Number(u16),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BotsSection {
    pub admin_ids: Option<Vec<i64>>,
    pub conversation_ttl_secs: Option<u64>,
}

impl FileConfig {
    /// A missing file is an empty config; an unreadable or malformed one is an error.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = env_str(&|k| env::var(k).ok(), "GRUZ_CONFIG")
            .unwrap_or_else(|| "config.yaml".to_string());
        let file = FileConfig::read(Path::new(&path))?;
        Self::resolve(file, &|k| env::var(k).ok())
    }

    /// Merge file values with an environment lookup (the environment wins).
    pub fn resolve(file: FileConfig, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = env_str(lookup, "DATABASE_URL")
            .or(file.database.url)
            .ok_or_else(|| Error::Config("DATABASE_URL is required".to_string()))?;
        let db_max_connections = env_parse::<u32>(lookup, "DB_MAX_CONNECTIONS")?
            .or(file.database.max_connections)
            .unwrap_or(10)
            .max(1);

        let http_port = match env_parse::<u16>(lookup, "HTTP_PORT")? {
            Some(p) => p,
            None => match env_parse::<u16>(lookup, "PORT")? {
                Some(p) => p,
                None => match file.server.port {
                    Some(Port::Number(p)) => p,
                    Some(Port::Text(s)) => s.trim().parse::<u16>().map_err(|_| {
                        Error::Config(format!("server.port is not a valid port: {s:?}"))
                    })?,
                    None => 8080,
                },
            },
        };
        let shutdown_timeout = Duration::from_secs(
            env_parse::<u64>(lookup, "SHUTDOWN_TIMEOUT_SECS")?
                .or(file.server.shutdown_timeout_secs)
                .unwrap_or(30),
        );

        let driver_bot_token = env_str(lookup, "DRIVER_BOT_TOKEN");
        let admin_bot_token = env_str(lookup, "ADMIN_BOT_TOKEN");
        let admin_ids = match env_str(lookup, "ADMIN_IDS") {
            Some(raw) => parse_csv_i64(&raw),
            None => file.bots.admin_ids.unwrap_or_default(),
        };
        let conversation_ttl = Duration::from_secs(
            env_parse::<u64>(lookup, "CONVERSATION_TTL_SECS")?
                .or(file.bots.conversation_ttl_secs)
                .unwrap_or(900),
        );

        let listeners = match env_str(lookup, "LISTENERS") {
            Some(raw) => parse_listeners(raw.split(','))?,
            None => match file.listeners {
                Some(list) => parse_listeners(list.iter().map(String::as_str))?,
                None => Listener::ALL.to_vec(),
            },
        };
        if listeners.contains(&Listener::Driver) && driver_bot_token.is_none() {
            return Err(Error::Config(
                "DRIVER_BOT_TOKEN is required when the driver bot is enabled".to_string(),
            ));
        }
        if listeners.contains(&Listener::Admin) && admin_bot_token.is_none() {
            return Err(Error::Config(
                "ADMIN_BOT_TOKEN is required when the admin bot is enabled".to_string(),
            ));
        }

        let log_json = env_bool(lookup, "LOG_JSON").unwrap_or(false);
        let env = env_str(lookup, "APP_ENV")
            .or(file.env)
            .unwrap_or_else(|| "development".to_string());

        Ok(Self {
            database_url,
            db_max_connections,
            http_port,
            driver_bot_token,
            admin_bot_token,
            admin_ids,
            conversation_ttl,
            listeners,
            shutdown_timeout,
            log_json,
            env,
        })
    }

    pub fn is_enabled(&self, listener: Listener) -> bool {
        self.listeners.contains(&listener)
    }
}

/// Blank values count as unset.
fn env_str(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = env_str(lookup, key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw:?}")))
}

fn env_bool(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    env_str(lookup, key).map(|s| {
        matches!(
            s.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_csv_i64(v: &str) -> Vec<i64> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn parse_listeners<'a>(items: impl Iterator<Item = &'a str>) -> Result<Vec<Listener>> {
    let mut out = Vec::new();
    for raw in items.map(str::trim).filter(|s| !s.is_empty()) {
        let listener = Listener::parse(raw)
            .ok_or_else(|| Error::Config(format!("unknown listener: {raw:?}")))?;
        if !out.contains(&listener) {
            out.push(listener);
        }
    }
    if out.is_empty() {
        return Err(Error::Config("LISTENERS enables nothing".to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn resolve(file: FileConfig, vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::resolve(file, &move |k| map.get(k).cloned())
    }

    #[test]
    fn defaults_with_all_tokens() {
        let cfg = resolve(
            FileConfig::default(),
            &[
                ("DATABASE_URL", "postgres://localhost/gruz"),
                ("DRIVER_BOT_TOKEN", "d"),
                ("ADMIN_BOT_TOKEN", "a"),
            ],
        )
        .unwrap();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_max_connections, 10);
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(cfg.conversation_ttl, Duration::from_secs(900));
        assert_eq!(cfg.listeners, Listener::ALL.to_vec());
        assert!(cfg.admin_ids.is_empty());
        assert!(!cfg.log_json);
    }

    #[test]
    fn missing_database_url_is_fatal() {
        let err = resolve(FileConfig::default(), &[("LISTENERS", "api")]).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("DATABASE_URL")));
    }

    #[test]
    fn bot_token_required_only_when_enabled() {
        let cfg = resolve(
            FileConfig::default(),
            &[("DATABASE_URL", "postgres://x"), ("LISTENERS", "api")],
        )
        .unwrap();
        assert_eq!(cfg.listeners, vec![Listener::Api]);

        let err = resolve(
            FileConfig::default(),
            &[("DATABASE_URL", "postgres://x"), ("LISTENERS", "api,driver")],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("DRIVER_BOT_TOKEN")));
    }

    #[test]
    fn yaml_values_are_overridden_by_env() {
        let file = FileConfig::parse(
            r#"
database:
  url: postgres://from-file/gruz
server:
  port: "9000"
bots:
  admin_ids: [1, 2]
listeners: [api, admin]
env: production
"#,
        )
        .unwrap();
        let cfg = resolve(
            file,
            &[
                ("DATABASE_URL", "postgres://from-env/gruz"),
                ("ADMIN_BOT_TOKEN", "a"),
                ("ADMIN_IDS", "123456789, x, 42"),
            ],
        )
        .unwrap();
        assert_eq!(cfg.database_url, "postgres://from-env/gruz");
        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.admin_ids, vec![123456789, 42]);
        assert_eq!(cfg.listeners, vec![Listener::Api, Listener::Admin]);
        assert_eq!(cfg.env, "production");
    }

    #[test]
    fn port_falls_back_to_generic_var() {
        let cfg = resolve(
            FileConfig::default(),
            &[("DATABASE_URL", "x"), ("LISTENERS", "api"), ("PORT", "3000")],
        )
        .unwrap();
        assert_eq!(cfg.http_port, 3000);
    }

    #[test]
    fn malformed_numbers_and_listeners_are_config_errors() {
        assert!(resolve(
            FileConfig::default(),
            &[("DATABASE_URL", "x"), ("LISTENERS", "api"), ("HTTP_PORT", "eighty")],
        )
        .is_err());
        assert!(resolve(
            FileConfig::default(),
            &[("DATABASE_URL", "x"), ("LISTENERS", "api,ftp")],
        )
        .is_err());
        assert!(resolve(
            FileConfig::default(),
            &[("DATABASE_URL", "x"), ("LISTENERS", " , ")],
        )
        .is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = resolve(
            FileConfig::default(),
            &[
                ("DATABASE_URL", "postgres://user:secret@db/gruz"),
                ("LISTENERS", "driver"),
                ("DRIVER_BOT_TOKEN", "123:token"),
            ],
        )
        .unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("secret"));
        assert!(!dbg.contains("123:token"));
    }

    #[test]
    fn example_config_parses() {
        let file = FileConfig::parse(include_str!("../../../config.example.yaml")).unwrap();
        let cfg = resolve(file, &[("DRIVER_BOT_TOKEN", "d"), ("ADMIN_BOT_TOKEN", "a")]).unwrap();
        assert_eq!(cfg.admin_ids, vec![123456789]);
        assert_eq!(cfg.listeners, Listener::ALL.to_vec());
    }

    #[test]
    fn missing_file_is_empty_config() {
        let file = FileConfig::read(Path::new("/nonexistent/gruz/config.yaml")).unwrap();
        assert!(file.database.url.is_none());
    }
}
