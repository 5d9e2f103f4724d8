/**
 * PING - L'appareil répond-il ?
 *
 * FONCTIONNEMENT :
 * - Un seul echo ICMP via la commande `ping` du système, timeout global 3s
 * - Groupe : tous les membres qui ont une IP sont pingés en parallèle,
 *   puis agrégés selon le PingMode (any / all)
 */

use crate::models::{Device, PingMode};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::debug;

const PING_TIMEOUT: Duration = Duration::from_secs(3);

#[cfg(windows)]
const PING_ARGS: &[&str] = &["-n", "1", "-w", "1000"];
#[cfg(not(windows))]
const PING_ARGS: &[&str] = &["-c", "1", "-W", "1"];

/// true si `ping` sort avec le code 0 avant le timeout
pub async fn ping(host: &str) -> bool {
    if host.is_empty() || host.starts_with('-') {
        return false;
    }

    let child = Command::new("ping")
        .args(PING_ARGS)
        .arg(host)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(PING_TIMEOUT, child).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            debug!(host, error = %e, "[ping] cannot run ping");
            false
        }
        Err(_) => {
            debug!(host, "[ping] timed out");
            false
        }
    }
}

/// Hôtes à sonder : l'IP de l'appareil simple, ou celle de chaque membre qui en a une.
pub fn probe_hosts(device: &Device) -> Vec<String> {
    if device.is_group() {
        device
            .sub_devices
            .iter()
            .filter(|s| !s.ip.is_empty())
            .map(|s| s.ip.clone())
            .collect()
    } else if device.ip.is_empty() {
        Vec::new()
    } else {
        vec![device.ip.clone()]
    }
}

/// Rien à sonder => hors ligne.
pub fn aggregate(mode: PingMode, results: &[bool]) -> bool {
    if results.is_empty() {
        return false;
    }
    match mode {
        PingMode::Any => results.iter().any(|r| *r),
        PingMode::All => results.iter().all(|r| *r),
    }
}

pub async fn device_online(device: &Device) -> bool {
    let hosts = probe_hosts(device);
    let mut probes = JoinSet::new();
    for host in hosts {
        probes.spawn(async move { ping(&host).await });
    }

    let mut results = Vec::with_capacity(probes.len());
    while let Some(res) = probes.join_next().await {
        results.push(res.unwrap_or(false));
    }
    aggregate(device.ping_mode(), &results)
}
