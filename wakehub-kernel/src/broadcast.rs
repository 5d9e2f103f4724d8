//! Broadcast target discovery
//!
//! This module handles:
//! - Network interface enumeration (IPv4 address + netmask + flags)
//! - Subnet broadcast computation (`ip | !mask`)
//! - Filtering of down and loopback interfaces, de-duplication

use std::io;
use std::net::Ipv4Addr;
use tracing::debug;

/// One IPv4 address assigned to a local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub name: String,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub is_up: bool,
    pub is_loopback: bool,
}

/// Source of interface addresses. The system implementation reads the OS tables;
/// tests plug in a fixed list.
pub trait InterfaceSource: Send + Sync {
    fn ipv4_addrs(&self) -> io::Result<Vec<InterfaceAddr>>;
}

/// Subnet broadcast address, octet-wise `ip | !mask`.
pub fn broadcast_address(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

/// Distinct broadcast addresses of every up, non-loopback interface, in discovery order.
pub fn broadcast_targets(addrs: &[InterfaceAddr]) -> Vec<Ipv4Addr> {
    let mut targets = Vec::new();
    for addr in addrs.iter().filter(|a| a.is_up && !a.is_loopback) {
        let bcast = broadcast_address(addr.ip, addr.netmask);
        debug!(interface = %addr.name, ip = %addr.ip, broadcast = %bcast, "broadcast target");
        if !targets.contains(&bcast) {
            targets.push(bcast);
        }
    }
    targets
}

/// Enumerates the interfaces of this host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

#[cfg(unix)]
impl InterfaceSource for SystemInterfaces {
    fn ipv4_addrs(&self) -> io::Result<Vec<InterfaceAddr>> {
        use nix::net::if_::InterfaceFlags;
        use std::net::SocketAddrV4;

        let ifaddrs = nix::ifaddrs::getifaddrs().map_err(io::Error::from)?;
        let mut out = Vec::new();
        for ifa in ifaddrs {
            let ip = ifa.address.as_ref().and_then(|a| a.as_sockaddr_in()).copied();
            let mask = ifa.netmask.as_ref().and_then(|a| a.as_sockaddr_in()).copied();
            let (Some(ip), Some(mask)) = (ip, mask) else {
                continue; // pas IPv4
            };
            out.push(InterfaceAddr {
                name: ifa.interface_name,
                ip: *SocketAddrV4::from(ip).ip(),
                netmask: *SocketAddrV4::from(mask).ip(),
                is_up: ifa.flags.contains(InterfaceFlags::IFF_UP),
                is_loopback: ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK),
            });
        }
        Ok(out)
    }
}

// if-addrs ne liste que les adaptateurs opérationnels sous Windows
#[cfg(not(unix))]
impl InterfaceSource for SystemInterfaces {
    fn ipv4_addrs(&self) -> io::Result<Vec<InterfaceAddr>> {
        use if_addrs::{get_if_addrs, IfAddr};

        let out = get_if_addrs()?
            .into_iter()
            .filter_map(|iface| {
                let is_loopback = iface.is_loopback();
                match iface.addr {
                    IfAddr::V4(v4) => Some(InterfaceAddr {
                        name: iface.name,
                        ip: v4.ip,
                        netmask: v4.netmask,
                        is_up: true,
                        is_loopback,
                    }),
                    IfAddr::V6(_) => None,
                }
            })
            .collect();
        Ok(out)
    }
}

/// Fixed interface list.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces(pub Vec<InterfaceAddr>);

#[cfg(test)]
impl InterfaceSource for StaticInterfaces {
    fn ipv4_addrs(&self) -> io::Result<Vec<InterfaceAddr>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, ip: [u8; 4], mask: [u8; 4], up: bool, lo: bool) -> InterfaceAddr {
        InterfaceAddr {
            name: name.into(),
            ip: ip.into(),
            netmask: mask.into(),
            is_up: up,
            is_loopback: lo,
        }
    }

    #[test]
    fn test_broadcast_address() {
        assert_eq!(
            broadcast_address(Ipv4Addr::new(192, 168, 1, 50), Ipv4Addr::new(255, 255, 255, 0)),
            Ipv4Addr::new(192, 168, 1, 255)
        );
        assert_eq!(
            broadcast_address(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(255, 255, 240, 0)),
            Ipv4Addr::new(10, 1, 15, 255)
        );
        assert_eq!(
            broadcast_address(Ipv4Addr::new(172, 16, 0, 9), Ipv4Addr::new(255, 255, 255, 255)),
            Ipv4Addr::new(172, 16, 0, 9)
        );
    }

    #[test]
    fn test_targets_skip_down_and_loopback_and_dedup() {
        let addrs = vec![
            iface("lo", [127, 0, 0, 1], [255, 0, 0, 0], true, true),
            iface("eth0", [192, 168, 1, 50], [255, 255, 255, 0], true, false),
            iface("eth0", [192, 168, 1, 51], [255, 255, 255, 0], true, false),
            iface("eth1", [10, 0, 0, 4], [255, 255, 0, 0], false, false),
            iface("wlan0", [172, 20, 3, 7], [255, 255, 252, 0], true, false),
        ];
        assert_eq!(
            broadcast_targets(&addrs),
            vec![Ipv4Addr::new(192, 168, 1, 255), Ipv4Addr::new(172, 20, 3, 255)]
        );
    }

    #[test]
    fn test_no_usable_interface() {
        let addrs = vec![iface("lo", [127, 0, 0, 1], [255, 0, 0, 0], true, true)];
        assert!(broadcast_targets(&addrs).is_empty());
    }

    #[test]
    fn test_system_enumeration_does_not_fail() {
        // le contenu dépend de la machine, seule l'énumération est vérifiée
        let addrs = SystemInterfaces.ipv4_addrs().unwrap();
        for a in broadcast_targets(&addrs) {
            assert!(!a.is_loopback());
        }
    }
}
