use serde::{Deserialize, Deserializer, Serialize};

/// Port HTTP par défaut du serveur
pub const DEFAULT_HTTP_PORT: u16 = 8888;
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 3;

/// Port UDP utilisé quand la cible n'en précise pas (discard, convention WOL)
pub const DEFAULT_WOL_PORT: u16 = 9;

/// Une carte réseau physique à réveiller, membre d'un groupe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubDevice {
    pub mac: String,
    pub ip: String,
    pub port: u16,
    pub broadcast_ip: String,
    pub remark: String,
}

/// Stratégie de ping pour un groupe : en ligne si un membre répond, ou tous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PingMode {
    #[default]
    Any,
    All,
}

/// Appareil enregistré : soit une cible unique (mac/ip/port/broadcast_ip),
/// soit un groupe (`sub_devices` non vide), jamais les deux.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mac: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub port: u16,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub broadcast_ip: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_devices: Vec<SubDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_ping_mode")]
    pub ping_mode: Option<PingMode>,
}

fn is_zero(port: &u16) -> bool {
    *port == 0
}

/// Ancien champ texte libre : "" ou valeur inconnue => absent (mode par défaut).
fn lenient_ping_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<PingMode>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let mode = match raw.as_ref().and_then(|v| v.as_str()).map(str::trim) {
        Some(s) if s.eq_ignore_ascii_case("any") => Some(PingMode::Any),
        Some(s) if s.eq_ignore_ascii_case("all") => Some(PingMode::All),
        Some("") | None => None,
        Some(other) => {
            tracing::warn!(ping_mode = other, "unknown ping_mode, using default");
            None
        }
    };
    Ok(mode)
}

/// Ce qu'il faut au moteur WOL pour une cible : mac, broadcast optionnel, port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeTarget {
    pub mac: String,
    pub broadcast_ip: Option<String>,
    pub port: u16,
}

impl WakeTarget {
    fn new(mac: &str, broadcast_ip: &str, port: u16) -> Self {
        Self {
            mac: mac.to_string(),
            broadcast_ip: (!broadcast_ip.is_empty()).then(|| broadcast_ip.to_string()),
            port: if port == 0 { DEFAULT_WOL_PORT } else { port },
        }
    }
}

impl SubDevice {
    pub fn wake_target(&self) -> WakeTarget {
        WakeTarget::new(&self.mac, &self.broadcast_ip, self.port)
    }
}

impl Device {
    pub fn is_group(&self) -> bool {
        !self.sub_devices.is_empty()
    }

    /// Vue "membre implicite" d'un appareil simple, utilisée par la validation.
    pub fn as_sub_device(&self) -> SubDevice {
        SubDevice {
            mac: self.mac.clone(),
            ip: self.ip.clone(),
            port: self.port,
            broadcast_ip: self.broadcast_ip.clone(),
            remark: String::new(),
        }
    }

    /// Un groupe ne garde pas de champs de cible unique.
    pub fn clear_single_target_if_group(&mut self) {
        if self.is_group() {
            self.mac.clear();
            self.ip.clear();
            self.port = 0;
            self.broadcast_ip.clear();
        }
    }

    pub fn wake_target(&self) -> WakeTarget {
        WakeTarget::new(&self.mac, &self.broadcast_ip, self.port)
    }

    pub fn ping_mode(&self) -> PingMode {
        self.ping_mode.unwrap_or_default()
    }
}

/// Contenu complet du fichier de persistance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub port: u16,
    pub log_dir: String,
    pub log_retention_days: u32,
    pub devices: Vec<Device>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            port: DEFAULT_HTTP_PORT,
            log_dir: DEFAULT_LOG_DIR.into(),
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
            devices: Vec::new(),
        }
    }
}

impl Snapshot {
    /// Remplace les valeurs nulles/vides (ancien fichier, champ absent) par les défauts.
    pub fn fill_defaults(&mut self) {
        if self.port == 0 {
            self.port = DEFAULT_HTTP_PORT;
        }
        if self.log_dir.is_empty() {
            self.log_dir = DEFAULT_LOG_DIR.into();
        }
        if self.log_retention_days == 0 {
            self.log_retention_days = DEFAULT_LOG_RETENTION_DAYS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_omits_empty_fields() {
        let d = Device { name: "nas".into(), ..Default::default() };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "nas" }));
    }

    #[test]
    fn test_snapshot_tolerates_missing_and_unknown_fields() {
        let snap: Snapshot = serde_json::from_str(
            r#"{"devices":[{"name":"pc","mac":"aa:bb:cc:dd:ee:ff","port":9,"color":"red"}],"theme":"dark"}"#,
        )
        .unwrap();
        assert_eq!(snap.port, DEFAULT_HTTP_PORT);
        assert_eq!(snap.devices.len(), 1);
        assert_eq!(snap.devices[0].mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(snap.devices[0].ping_mode, None);
    }

    #[test]
    fn test_fill_defaults() {
        let mut snap = Snapshot { port: 0, log_dir: String::new(), log_retention_days: 0, devices: vec![] };
        snap.fill_defaults();
        assert_eq!(snap, Snapshot::default());
    }

    #[test]
    fn test_wake_target_defaults() {
        let d = Device { name: "pc".into(), mac: "aa:bb:cc:dd:ee:ff".into(), ..Default::default() };
        let t = d.wake_target();
        assert_eq!(t.port, DEFAULT_WOL_PORT);
        assert_eq!(t.broadcast_ip, None);

        let sub = SubDevice { mac: "aa:bb:cc:dd:ee:ff".into(), port: 7, broadcast_ip: "10.0.0.255".into(), ..Default::default() };
        let t = sub.wake_target();
        assert_eq!(t.port, 7);
        assert_eq!(t.broadcast_ip.as_deref(), Some("10.0.0.255"));
    }

    #[test]
    fn test_ping_mode_tolerates_legacy_values() {
        for raw in ["\"\"", "\"sometimes\"", "null", "3"] {
            let d: Device = serde_json::from_str(&format!("{{\"name\":\"g\",\"ping_mode\":{raw}}}")).unwrap();
            assert_eq!(d.ping_mode, None, "{raw}");
            assert_eq!(d.ping_mode(), PingMode::Any);
        }
        let d: Device = serde_json::from_str(r#"{"name":"g","ping_mode":"ALL"}"#).unwrap();
        assert_eq!(d.ping_mode, Some(PingMode::All));
    }

    #[test]
    fn test_ping_mode_wire_format() {
        let d: Device = serde_json::from_str(r#"{"name":"g","ping_mode":"all"}"#).unwrap();
        assert_eq!(d.ping_mode(), PingMode::All);
        assert_eq!(Device::default().ping_mode(), PingMode::Any);
    }
}
