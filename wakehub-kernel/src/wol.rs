/**
 * MOTEUR WAKE-ON-LAN
 *
 * RÔLE : Construire le magic packet (6 x 0xFF + 16 x MAC, 102 octets) et l'envoyer
 * en UDP vers une adresse broadcast explicite ou vers toutes les interfaces IPv4 actives.
 *
 * FONCTIONNEMENT :
 * - Paquet construit une seule fois, envoyé N rounds (5 par défaut, 100 ms entre rounds)
 * - Envoi "best effort" : un échec sur une cible n'empêche pas les autres, il est
 *   seulement consigné dans le rapport
 * - Appel bloquant (~400 ms) : à lancer depuis spawn_blocking côté HTTP
 */

use crate::broadcast::{broadcast_targets, InterfaceSource, SystemInterfaces};
use crate::models::{Device, WakeTarget};
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MAGIC_PACKET_LEN: usize = 102;

#[derive(Debug, thiserror::Error)]
pub enum WolError {
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
    #[error("invalid broadcast address: {0}")]
    InvalidBroadcast(String),
    #[error("failed to enumerate network interfaces: {0}")]
    Interfaces(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicPacket([u8; MAGIC_PACKET_LEN]);

impl MagicPacket {
    /// Accepte `:`, `-` et `.` comme séparateurs (ou aucun) ; 12 chiffres hexa exactement.
    pub fn new(mac: &str) -> Result<Self, WolError> {
        let hex: String = mac.chars().filter(|c| !matches!(c, ':' | '-' | '.')).collect();
        let mac_bytes = decode_hex(&hex).ok_or_else(|| WolError::InvalidMac(mac.to_string()))?;
        let mac_bytes: [u8; 6] = mac_bytes
            .try_into()
            .map_err(|_| WolError::InvalidMac(mac.to_string()))?;

        let mut pkt = [0xFFu8; MAGIC_PACKET_LEN];
        for chunk in pkt[6..].chunks_exact_mut(6) {
            chunk.copy_from_slice(&mac_bytes);
        }
        Ok(Self(pkt))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    // from_str_radix tolère un signe "+" en tête
    if hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeOptions {
    pub repeats: u32,
    pub interval: Duration,
}

impl Default for WakeOptions {
    fn default() -> Self {
        Self { repeats: 5, interval: Duration::from_millis(100) }
    }
}

/// Résultat d'un envoi individuel.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub target: SocketAddrV4,
    pub round: u32,
    pub result: Result<(), String>,
}

#[derive(Debug, Clone)]
pub struct WakeReport {
    pub targets: Vec<SocketAddrV4>,
    pub outcomes: Vec<SendOutcome>,
}

impl WakeReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

#[derive(Debug)]
pub struct MemberWake {
    pub index: usize,
    pub mac: String,
    pub result: Result<WakeReport, WolError>,
}

/// Réveil d'un groupe : un résultat par membre, l'échec d'un membre n'arrête pas les autres.
#[derive(Debug, Default)]
pub struct GroupWake {
    pub members: Vec<MemberWake>,
}

impl GroupWake {
    pub fn succeeded(&self) -> usize {
        self.members.iter().filter(|m| m.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.members.len() - self.succeeded()
    }

    pub fn errors(&self) -> impl Iterator<Item = (&MemberWake, &WolError)> {
        self.members.iter().filter_map(|m| m.result.as_ref().err().map(|e| (m, e)))
    }
}

#[derive(Debug)]
pub enum DeviceWake {
    Single(Result<WakeReport, WolError>),
    Group(GroupWake),
}

pub struct WakeEngine<S = SystemInterfaces> {
    interfaces: S,
    options: WakeOptions,
}

impl WakeEngine<SystemInterfaces> {
    pub fn new() -> Self {
        Self::with_source(SystemInterfaces, WakeOptions::default())
    }
}

impl Default for WakeEngine<SystemInterfaces> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: InterfaceSource> WakeEngine<S> {
    pub fn with_source(interfaces: S, options: WakeOptions) -> Self {
        Self { interfaces, options }
    }

    /// Cibles pour `port` : le broadcast explicite s'il est donné, sinon le broadcast
    /// de chaque interface active, et en dernier recours 255.255.255.255.
    pub fn resolve_targets(&self, broadcast_ip: Option<&str>, port: u16) -> Result<Vec<SocketAddrV4>, WolError> {
        if let Some(ip) = broadcast_ip.filter(|s| !s.is_empty()) {
            let ip: Ipv4Addr = ip.parse().map_err(|_| WolError::InvalidBroadcast(ip.to_string()))?;
            return Ok(vec![SocketAddrV4::new(ip, port)]);
        }

        let addrs = self.interfaces.ipv4_addrs().map_err(WolError::Interfaces)?;
        let bcasts = broadcast_targets(&addrs);
        if bcasts.is_empty() {
            warn!("no usable IPv4 interface, falling back to limited broadcast");
            return Ok(vec![SocketAddrV4::new(Ipv4Addr::BROADCAST, port)]);
        }
        Ok(bcasts.into_iter().map(|ip| SocketAddrV4::new(ip, port)).collect())
    }

    /// Bloquant : `repeats` rounds sur toutes les cibles, `interval` entre deux rounds.
    pub fn wake(&self, mac: &str, broadcast_ip: Option<&str>, port: u16) -> Result<WakeReport, WolError> {
        let packet = MagicPacket::new(mac)?;
        let targets = self.resolve_targets(broadcast_ip, port)?;

        let report = match open_broadcast_socket() {
            Ok(sock) => self.send_rounds(&sock, &packet, targets),
            Err(e) => {
                warn!(mac, error = %e, "cannot open broadcast socket, nothing sent");
                unsent_report(targets, &e)
            }
        };
        info!(
            mac,
            targets = report.targets.len(),
            delivered = report.delivered(),
            failed = report.failed(),
            "magic packets sent"
        );
        Ok(report)
    }

    fn send_rounds(&self, sock: &UdpSocket, packet: &MagicPacket, targets: Vec<SocketAddrV4>) -> WakeReport {
        let mut outcomes = Vec::with_capacity(targets.len() * self.options.repeats as usize);
        for round in 0..self.options.repeats {
            if round > 0 {
                std::thread::sleep(self.options.interval);
            }
            for target in &targets {
                let result = sock.send_to(packet.as_bytes(), target).map(|_| ()).map_err(|e| {
                    debug!(%target, round, error = %e, "magic packet send failed");
                    e.to_string()
                });
                outcomes.push(SendOutcome { target: *target, round, result });
            }
        }
        WakeReport { targets, outcomes }
    }

    pub fn wake_target(&self, target: &WakeTarget) -> Result<WakeReport, WolError> {
        self.wake(&target.mac, target.broadcast_ip.as_deref(), target.port)
    }

    pub fn wake_group(&self, device: &Device) -> GroupWake {
        let members = device
            .sub_devices
            .iter()
            .enumerate()
            .map(|(index, sub)| MemberWake {
                index,
                mac: sub.mac.clone(),
                result: self.wake_target(&sub.wake_target()),
            })
            .collect();
        GroupWake { members }
    }

    pub fn wake_device(&self, device: &Device) -> DeviceWake {
        if device.is_group() {
            DeviceWake::Group(self.wake_group(device))
        } else {
            DeviceWake::Single(self.wake_target(&device.wake_target()))
        }
    }
}

fn open_broadcast_socket() -> std::io::Result<UdpSocket> {
    let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    sock.set_broadcast(true)?;
    Ok(sock)
}

/// Socket inutilisable : chaque cible compte comme un envoi raté, pas comme une erreur d'appel.
fn unsent_report(targets: Vec<SocketAddrV4>, err: &std::io::Error) -> WakeReport {
    let outcomes = targets
        .iter()
        .map(|target| SendOutcome { target: *target, round: 0, result: Err(err.to_string()) })
        .collect();
    WakeReport { targets, outcomes }
}
