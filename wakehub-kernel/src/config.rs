use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_STORE_PATH: &str = "wol.json";

/// Réglages de démarrage lus dans l'environnement (après `.env`).
/// Le reste (port HTTP, logs) vit dans le snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_path: PathBuf,
    pub bind: Ipv4Addr,
}

impl Default for Settings {
    fn default() -> Self {
        Self { store_path: PathBuf::from(DEFAULT_STORE_PATH), bind: Ipv4Addr::UNSPECIFIED }
    }
}

pub fn load_settings() -> Settings {
    settings_from(|key| std::env::var(key).ok())
}

fn settings_from<F: Fn(&str) -> Option<String>>(var: F) -> Settings {
    let mut settings = Settings::default();

    if let Some(path) = var("WAKEHUB_STORE").filter(|p| !p.trim().is_empty()) {
        settings.store_path = PathBuf::from(path);
    }

    if let Some(raw) = var("WAKEHUB_BIND").filter(|b| !b.trim().is_empty()) {
        match raw.trim().parse() {
            Ok(ip) => settings.bind = ip,
            Err(_) => warn!(value = %raw, "[config] WAKEHUB_BIND invalide, usage de 0.0.0.0"),
        }
    }

    settings
}
