//! Server settings: `config/default.toml`, then `microcosm.toml`, then an
//! explicit `--config-file`, then `MICROCOSM__*` variables, then CLI flags.

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "microcosm";
const ENV_PREFIX: &str = "MICROCOSM";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_CAPACITY: u64 = 10_000;
const DEFAULT_CACHE_RESULT_TTL_SECS: u64 = 60 * 60 * 24;
const DEFAULT_CACHE_DEDUP_TTL_SECS: u64 = 60 * 5;
const DEFAULT_SITE_ID: i64 = 1;

/// Command-line arguments for the microcosm binary.
#[derive(Debug, Parser)]
#[command(name = "microcosm", version, about = "Community question service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MICROCOSM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the number of identities the result cache holds.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<u64>,

    /// Override the result cache lifetime.
    #[arg(long = "cache-result-ttl-seconds", value_name = "SECONDS")]
    pub cache_result_ttl_seconds: Option<u64>,

    /// Override the duplicate-submission window.
    #[arg(long = "cache-dedup-ttl-seconds", value_name = "SECONDS")]
    pub cache_dedup_ttl_seconds: Option<u64>,

    /// Override the site used when a request carries no `x-site-id`.
    #[arg(long = "site-default-id", value_name = "ID")]
    pub site_default_id: Option<i64>,
}

/// Validated settings for one server process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub capacity: NonZeroUsize,
    pub result_ttl: Duration,
    pub dedup_ttl: Duration,
}

/// Tenant defaults handed to the identity middleware.
#[derive(Debug, Clone, Default)]
pub struct SiteSettings {
    pub default_site_id: i64,
    /// Profiles treated as site owners, keyed by `(site_id, profile_id)`.
    pub owners: Vec<(i64, i64)>,
}

impl SiteSettings {
    pub fn is_owner(&self, site_id: i64, profile_id: i64) -> bool {
        profile_id > 0 && self.owners.contains(&(site_id, profile_id))
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings: {0}")]
    Build(#[from] config::ConfigError),
    #[error("`{key}` is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Resolve and validate settings for the parsed command line.
pub fn load(cli: &CliArgs) -> Result<Settings, SettingsError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    site: RawSiteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        self.apply_database_override(&overrides.database);
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(seconds) = overrides.cache_result_ttl_seconds {
            self.cache.result_ttl_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_dedup_ttl_seconds {
            self.cache.dedup_ttl_seconds = Some(seconds);
        }
        if let Some(site_id) = overrides.site_default_id {
            self.site.default_site_id = Some(site_id);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, SettingsError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            site,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            site: build_site_settings(site)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, SettingsError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(SettingsError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| SettingsError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, SettingsError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            SettingsError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, SettingsError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url,
        max_connections: non_zero_u32(max_value.into(), "database.max_connections")?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, SettingsError> {
    let capacity_value = cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
    let capacity = usize::try_from(capacity_value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| SettingsError::invalid("cache.capacity", "must be a positive count"))?;

    let result_ttl = non_zero_seconds(
        cache
            .result_ttl_seconds
            .unwrap_or(DEFAULT_CACHE_RESULT_TTL_SECS),
        "cache.result_ttl_seconds",
    )?;
    let dedup_ttl = non_zero_seconds(
        cache
            .dedup_ttl_seconds
            .unwrap_or(DEFAULT_CACHE_DEDUP_TTL_SECS),
        "cache.dedup_ttl_seconds",
    )?;

    Ok(CacheSettings {
        capacity,
        result_ttl,
        dedup_ttl,
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, SettingsError> {
    let default_site_id = site.default_site_id.unwrap_or(DEFAULT_SITE_ID);
    if default_site_id <= 0 {
        return Err(SettingsError::invalid(
            "site.default_site_id",
            "must be greater than zero",
        ));
    }

    let mut owners = Vec::with_capacity(site.owners.len());
    for owner in site.owners {
        if owner.site_id <= 0 || owner.profile_id <= 0 {
            return Err(SettingsError::invalid(
                "site.owners",
                format!(
                    "site {} / profile {} must both be greater than zero",
                    owner.site_id, owner.profile_id
                ),
            ));
        }
        owners.push((owner.site_id, owner.profile_id));
    }

    Ok(SiteSettings {
        default_site_id,
        owners,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    capacity: Option<u64>,
    result_ttl_seconds: Option<u64>,
    dedup_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    default_site_id: Option<i64>,
    owners: Vec<RawSiteOwner>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSiteOwner {
    site_id: i64,
    profile_id: i64,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, SettingsError> {
    if value == 0 {
        return Err(SettingsError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| SettingsError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| SettingsError::invalid(key, "must be greater than zero"))
}

fn non_zero_seconds(value: u64, key: &'static str) -> Result<Duration, SettingsError> {
    if value == 0 {
        return Err(SettingsError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), SettingsError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
