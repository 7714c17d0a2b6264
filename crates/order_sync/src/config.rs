use std::{collections::HashMap, fs, io, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "order_sync.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncSettings {
    pub backend_url: String,
    pub page_size: u32,
    pub search_debounce_ms: u64,
    pub enrichment_refresh_delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8080".into(),
            page_size: 15,
            search_debounce_ms: 300,
            enrichment_refresh_delay_ms: 1500,
        }
    }
}

impl SyncSettings {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn enrichment_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.enrichment_refresh_delay_ms)
    }
}

/// Defaults, then `order_sync.toml` in the working directory if present, then
/// environment overrides.
pub fn load_settings() -> SyncSettings {
    let mut settings = SyncSettings::default();

    match read_settings_table(Path::new(SETTINGS_FILE)) {
        Ok(Some(table)) => apply_table(&mut settings, &table),
        Ok(None) => {}
        Err(err) => warn!(error = %format!("{err:#}"), "ignoring unreadable settings file"),
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Like [`load_settings`] but the settings file must exist and parse.
pub fn load_settings_from(path: &Path) -> anyhow::Result<SyncSettings> {
    let mut settings = SyncSettings::default();
    let table = read_settings_table(path)?
        .with_context(|| format!("settings file '{}' does not exist", path.display()))?;
    apply_table(&mut settings, &table);
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn read_settings_table(path: &Path) -> anyhow::Result<Option<HashMap<String, toml::Value>>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    };

    let table = toml::from_str::<HashMap<String, toml::Value>>(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
    Ok(Some(table))
}

fn table_text(table: &HashMap<String, toml::Value>, key: &str) -> Option<String> {
    match table.get(key)? {
        toml::Value::String(v) => Some(v.clone()),
        toml::Value::Integer(v) => Some(v.to_string()),
        _ => None,
    }
}

pub(crate) fn apply_table(settings: &mut SyncSettings, table: &HashMap<String, toml::Value>) {
    if let Some(v) = table_text(table, "backend_url") {
        settings.backend_url = v;
    }
    if let Some(v) = table_text(table, "page_size") {
        set_positive(&mut settings.page_size, &v, "page_size");
    }
    if let Some(v) = table_text(table, "search_debounce_ms") {
        set_number(&mut settings.search_debounce_ms, &v, "search_debounce_ms");
    }
    if let Some(v) = table_text(table, "enrichment_refresh_delay_ms") {
        set_number(
            &mut settings.enrichment_refresh_delay_ms,
            &v,
            "enrichment_refresh_delay_ms",
        );
    }
}

pub(crate) fn apply_env(settings: &mut SyncSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ORDER_SYNC_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = lookup("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = lookup("APP__PAGE_SIZE") {
        set_positive(&mut settings.page_size, &v, "APP__PAGE_SIZE");
    }
    if let Some(v) = lookup("APP__SEARCH_DEBOUNCE_MS") {
        set_number(&mut settings.search_debounce_ms, &v, "APP__SEARCH_DEBOUNCE_MS");
    }
    if let Some(v) = lookup("APP__ENRICHMENT_REFRESH_DELAY_MS") {
        set_number(
            &mut settings.enrichment_refresh_delay_ms,
            &v,
            "APP__ENRICHMENT_REFRESH_DELAY_MS",
        );
    }
}

fn set_positive(slot: &mut u32, raw: &str, key: &str) {
    match raw.trim().parse::<u32>() {
        Ok(parsed) if parsed > 0 => *slot = parsed,
        _ => warn!(key, value = raw, "ignoring invalid page size"),
    }
}

fn set_number(slot: &mut u64, raw: &str, key: &str) {
    match raw.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => *slot = parsed,
        _ => warn!(key, value = raw, "ignoring invalid duration"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
