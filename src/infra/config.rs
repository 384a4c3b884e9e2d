//! Configuration loading from TOML files
//!
//! Config file is selected with --config <path>, defaulting to
//! config/dev.toml. A missing or malformed file falls back to defaults
//! with a warning rather than refusing to start.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteConfig {
    /// Unique site identifier (e.g., "porteria-norte")
    #[serde(default = "default_site_id")]
    pub id: String,
}

fn default_site_id() -> String {
    "rfid-gate".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind")]
    pub bind: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_http_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind: default_http_bind(), port: default_http_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// File path for the access-event audit trail (JSONL format)
    #[serde(default = "default_audit_file")]
    pub file: String,
    /// Disable to keep the event log in memory only
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
}

fn default_audit_file() -> String {
    "eventos.jsonl".to_string()
}

fn default_audit_enabled() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { file: default_audit_file(), enabled: default_audit_enabled() }
    }
}

/// One pre-shared API token and the caller it authenticates as
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenEntry {
    pub token: String,
    pub email: String,
    /// "ADMIN" or "OPERADOR"
    pub rol: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

/// Seed zone loaded into the store at startup
#[derive(Debug, Clone, Deserialize)]
pub struct SeedZone {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Seed sensor loaded into the store at startup
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSensor {
    pub uid: String,
    #[serde(default)]
    pub alias: String,
    /// One of ACTIVO / INACTIVO / BLOQUEADO / PERDIDO
    #[serde(default = "default_estado")]
    pub estado: String,
    /// Name of a seed zone
    pub zone: String,
    #[serde(default)]
    pub user: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_estado() -> String {
    "ACTIVO".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SeedConfig {
    #[serde(default)]
    pub zones: Vec<SeedZone>,
    #[serde(default)]
    pub sensors: Vec<SeedSensor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    http_bind: String,
    http_port: u16,
    audit_file: String,
    audit_enabled: bool,
    tokens: Vec<TokenEntry>,
    seed_zones: Vec<SeedZone>,
    seed_sensors: Vec<SeedSensor>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            http_bind: default_http_bind(),
            http_port: default_http_port(),
            audit_file: default_audit_file(),
            audit_enabled: true,
            tokens: Vec::new(),
            seed_zones: Vec::new(),
            seed_sensors: Vec::new(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            site_id: toml_config.site.id,
            http_bind: toml_config.http.bind,
            http_port: toml_config.http.port,
            audit_file: toml_config.audit.file,
            audit_enabled: toml_config.audit.enabled,
            tokens: toml_config.auth.tokens,
            seed_zones: toml_config.seed.zones,
            seed_sensors: toml_config.seed.sensors,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn http_bind(&self) -> &str {
        &self.http_bind
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn audit_file(&self) -> &str {
        &self.audit_file
    }

    pub fn audit_enabled(&self) -> bool {
        self.audit_enabled
    }

    pub fn tokens(&self) -> &[TokenEntry] {
        &self.tokens
    }

    pub fn seed_zones(&self) -> &[SeedZone] {
        &self.seed_zones
    }

    pub fn seed_sensors(&self) -> &[SeedSensor] {
        &self.seed_sensors
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to register an API token
    #[cfg(test)]
    pub fn with_token(mut self, token: &str, email: &str, rol: &str) -> Self {
        self.tokens.push(TokenEntry {
            token: token.to_string(),
            email: email.to_string(),
            rol: rol.to_string(),
        });
        self
    }
}
