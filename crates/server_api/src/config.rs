use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, bail, Context};
use checkout::{CallPolicy, CheckoutServices, HttpRelayNotifier, LogNotifier, OrderNotifier, Payee};
use serde::Deserialize;
use shared::{catalog::default_catalog, domain::Product};
use storage::{AppwriteClient, AppwriteConfig, OrderDocuments, ProofStorage, Storage};
use tracing::info;

use crate::ApiContext;

pub const DEFAULT_CONFIG_PATH: &str = "server.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Appwrite,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "appwrite" => Ok(Backend::Appwrite),
            other => Err(anyhow!("unknown storage backend {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub backend: Backend,
    pub database_url: String,
    /// Prefix for proof references and tracking links.
    pub public_base_url: String,
    pub appwrite: AppwriteConfig,
    pub upi_payee_id: String,
    pub upi_payee_name: String,
    pub email_domain: String,
    pub notification_relay_url: Option<String>,
    pub request_timeout_secs: u64,
    pub upload_attempts: u32,
    pub catalog: Vec<Product>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            backend: Backend::Sqlite,
            database_url: "sqlite://./data/merch.db".into(),
            public_base_url: "http://127.0.0.1:8080".into(),
            appwrite: AppwriteConfig::default(),
            upi_payee_id: "webnd@upi".into(),
            upi_payee_name: "Web and Design Society".into(),
            email_domain: "iitbbs.ac.in".into(),
            notification_relay_url: None,
            request_timeout_secs: 30,
            upload_attempts: 1,
            catalog: default_catalog(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("invalid settings file")
    }

    pub fn payee(&self) -> Payee {
        Payee {
            upi_id: self.upi_payee_id.clone(),
            name: self.upi_payee_name.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: self.request_timeout(),
            upload_attempts: self.upload_attempts.max(1),
            ..CallPolicy::default()
        }
    }

    /// Applies `APP__*` overrides plus the conventional `DATABASE_URL`,
    /// `SERVER_BIND` and `SERVER_PUBLIC_URL`. `APP__*` wins.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| names.iter().find_map(|name| lookup(*name));

        if let Some(v) = first(&["APP__BIND_ADDR", "SERVER_BIND"]) {
            self.bind_addr = v;
        }
        if let Some(v) = first(&["APP__BACKEND"]) {
            self.backend = v.parse()?;
        }
        if let Some(v) = first(&["APP__DATABASE_URL", "DATABASE_URL"]) {
            self.database_url = v;
        }
        if let Some(v) = first(&["APP__PUBLIC_BASE_URL", "SERVER_PUBLIC_URL"]) {
            self.public_base_url = v;
        }

        let appwrite = &mut self.appwrite;
        for (name, field) in [
            ("APP__APPWRITE_ENDPOINT", &mut appwrite.endpoint),
            ("APP__APPWRITE_PROJECT_ID", &mut appwrite.project_id),
            ("APP__APPWRITE_API_KEY", &mut appwrite.api_key),
            ("APP__APPWRITE_DATABASE_ID", &mut appwrite.database_id),
            ("APP__APPWRITE_COLLECTION_ID", &mut appwrite.collection_id),
            ("APP__APPWRITE_BUCKET_ID", &mut appwrite.bucket_id),
        ] {
            if let Some(v) = lookup(name) {
                *field = v;
            }
        }

        if let Some(v) = first(&["APP__UPI_PAYEE_ID"]) {
            self.upi_payee_id = v;
        }
        if let Some(v) = first(&["APP__UPI_PAYEE_NAME"]) {
            self.upi_payee_name = v;
        }
        if let Some(v) = first(&["APP__EMAIL_DOMAIN"]) {
            self.email_domain = v;
        }
        if let Some(v) = first(&["APP__NOTIFICATION_RELAY_URL"]) {
            self.notification_relay_url = Some(v).filter(|url| !url.trim().is_empty());
        }
        if let Some(v) = first(&["APP__REQUEST_TIMEOUT_SECS"]) {
            self.request_timeout_secs = v
                .parse()
                .with_context(|| format!("APP__REQUEST_TIMEOUT_SECS is not a number: {v}"))?;
        }
        if let Some(v) = first(&["APP__UPLOAD_ATTEMPTS"]) {
            self.upload_attempts = v
                .parse()
                .with_context(|| format!("APP__UPLOAD_ATTEMPTS is not a number: {v}"))?;
        }
        Ok(())
    }

    fn appwrite_config(&self) -> anyhow::Result<AppwriteConfig> {
        let config = &self.appwrite;
        for (name, value) in [
            ("endpoint", &config.endpoint),
            ("project_id", &config.project_id),
            ("api_key", &config.api_key),
            ("database_id", &config.database_id),
            ("collection_id", &config.collection_id),
            ("bucket_id", &config.bucket_id),
        ] {
            if value.trim().is_empty() {
                bail!("appwrite backend selected but appwrite.{name} is not set");
            }
        }
        Ok(config.clone())
    }
}

/// Reads the settings file named by `APP__CONFIG` (default `server.toml`) if
/// it exists, then applies environment overrides.
pub fn load_settings() -> anyhow::Result<Settings> {
    let path = std::env::var("APP__CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut settings = match fs::read_to_string(&path) {
        Ok(raw) => Settings::from_toml_str(&raw).with_context(|| format!("failed to load {path}"))?,
        Err(_) => Settings::default(),
    };
    settings.apply_env_overrides(|name| std::env::var(name).ok())?;
    Ok(settings)
}

/// Opens the configured backends and wires them into an [`ApiContext`].
pub async fn build_context(settings: &Settings) -> anyhow::Result<ApiContext> {
    let timeout = settings.request_timeout();
    let (documents, proofs): (Arc<dyn OrderDocuments>, Arc<dyn ProofStorage>) =
        match settings.backend {
            Backend::Sqlite => {
                let database_url = prepare_database_url(&settings.database_url)?;
                let storage = Arc::new(
                    Storage::new(&database_url)
                        .await
                        .with_context(|| format!("failed to open {database_url}"))?
                        .with_public_base_url(settings.public_base_url.as_str()),
                );
                info!(%database_url, "using sqlite backend");
                let documents: Arc<dyn OrderDocuments> = storage.clone();
                let proofs: Arc<dyn ProofStorage> = storage;
                (documents, proofs)
            }
            Backend::Appwrite => {
                let config = settings.appwrite_config()?;
                info!(endpoint = %config.endpoint, "using appwrite backend");
                let client = Arc::new(AppwriteClient::new(config, timeout)?);
                let documents: Arc<dyn OrderDocuments> = client.clone();
                let proofs: Arc<dyn ProofStorage> = client;
                (documents, proofs)
            }
        };

    let notifier: Arc<dyn OrderNotifier> = match &settings.notification_relay_url {
        Some(relay_url) => Arc::new(HttpRelayNotifier::new(relay_url.as_str(), timeout)?),
        None => Arc::new(LogNotifier),
    };

    let catalog = if settings.catalog.is_empty() {
        default_catalog()
    } else {
        settings.catalog.clone()
    };

    Ok(ApiContext {
        checkout: CheckoutServices {
            documents,
            proofs,
            notifier,
            policy: settings.call_policy(),
            tracking_base_url: settings.public_base_url.clone(),
        },
        catalog: Arc::new(catalog),
        email_domain: settings.email_domain.clone(),
    })
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
