//! Contrôles syntaxiques des champs d'un appareil (MAC, IP/hostname, port).
//! Fonctions pures, aucun état.

use crate::models::{Device, SubDevice};
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("device name is required")]
    MissingName,
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
    #[error("invalid IP or hostname: {0}")]
    InvalidHost(String),
    #[error("invalid port number: {0}")]
    InvalidPort(u16),
    #[error("invalid broadcast IP: {0}")]
    InvalidBroadcast(String),
    #[error("sub-device {index}: {source}")]
    InSubDevice {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

/// MAC à 6 octets : `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` ou `aabb.ccdd.eeff`.
pub fn is_valid_mac(mac: &str) -> bool {
    let groups = |sep: char, width: usize, count: usize| {
        let parts: Vec<&str> = mac.split(sep).collect();
        parts.len() == count
            && parts
                .iter()
                .all(|p| p.len() == width && p.chars().all(|c| c.is_ascii_hexdigit()))
    };
    groups(':', 2, 6) || groups('-', 2, 6) || groups('.', 4, 3)
}

pub fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok()
}

/// Hostname RFC 1123 : labels de 1 à 63 alphanumériques/tirets, sans tiret
/// en début ou fin, séparés par des points, 255 caractères max.
pub fn is_valid_hostname(host: &str) -> bool {
    if host.is_empty() || host.len() > 255 {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Champ optionnel : vide accepté.
pub fn is_valid_host_or_ip(host: &str) -> bool {
    host.is_empty() || is_valid_ip(host) || is_valid_hostname(host)
}

pub fn is_valid_port(port: u16) -> bool {
    port >= 1
}

pub fn validate_sub_device(sd: &SubDevice) -> Result<(), ValidationError> {
    if !is_valid_mac(&sd.mac) {
        return Err(ValidationError::InvalidMac(sd.mac.clone()));
    }
    if !is_valid_host_or_ip(&sd.ip) {
        return Err(ValidationError::InvalidHost(sd.ip.clone()));
    }
    if !is_valid_port(sd.port) {
        return Err(ValidationError::InvalidPort(sd.port));
    }
    if !sd.broadcast_ip.is_empty() && !is_valid_ip(&sd.broadcast_ip) {
        return Err(ValidationError::InvalidBroadcast(sd.broadcast_ip.clone()));
    }
    Ok(())
}

pub fn validate_device(d: &Device) -> Result<(), ValidationError> {
    if d.name.is_empty() {
        return Err(ValidationError::MissingName);
    }
    if d.is_group() {
        for (index, sd) in d.sub_devices.iter().enumerate() {
            validate_sub_device(sd).map_err(|e| ValidationError::InSubDevice {
                index,
                source: Box::new(e),
            })?;
        }
        Ok(())
    } else {
        validate_sub_device(&d.as_sub_device())
    }
}
