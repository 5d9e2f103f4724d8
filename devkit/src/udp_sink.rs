/*!
Sink UDP pour tests sans vraie carte réseau

Écoute sur 127.0.0.1 (port éphémère) et enregistre chaque datagramme reçu.
Permet de vérifier le contenu et le nombre de magic packets envoyés.
*/

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub const MAGIC_PACKET_LEN: usize = 102;

#[derive(Debug, Clone)]
pub struct ReceivedDatagram {
    pub from: SocketAddr,
    pub payload: Vec<u8>,
}

/// Listener UDP qui collecte les datagrammes dans un thread de fond
pub struct UdpSink {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedDatagram>>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl UdpSink {
    /// Bind sur 127.0.0.1:0 et démarre la collecte
    pub fn bind() -> io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        socket.set_read_timeout(Some(Duration::from_millis(50)))?;
        let addr = socket.local_addr()?;

        let received = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let received = received.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut buf = [0u8; 2048];
                while !stop.load(Ordering::Relaxed) {
                    match socket.recv_from(&mut buf) {
                        Ok((len, from)) => {
                            log::debug!("[sink] {} bytes from {}", len, from);
                            if let Ok(mut list) = received.lock() {
                                list.push(ReceivedDatagram { from, payload: buf[..len].to_vec() });
                            }
                        }
                        // timeout de lecture : on reboucle pour vérifier `stop`
                        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
                        Err(e) => {
                            log::warn!("[sink] recv error: {}", e);
                            break;
                        }
                    }
                }
            })
        };

        log::info!("📡 [sink] listening on {}", addr);
        Ok(Self { addr, received, stop, worker: Some(worker) })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Copie de tous les datagrammes reçus jusqu'ici
    pub fn datagrams(&self) -> Vec<ReceivedDatagram> {
        self.received.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Payloads seuls, dans l'ordre de réception
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.datagrams().into_iter().map(|d| d.payload).collect()
    }

    /// Attend au moins `count` datagrammes (ou le timeout) et renvoie les payloads reçus
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Vec<u8>> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.datagrams().len() >= count {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        self.payloads()
    }

    /// Datagrammes qui sont des magic packets valides pour `mac` (6 octets bruts)
    pub fn magic_packets_for(&self, mac: [u8; 6]) -> usize {
        self.payloads().iter().filter(|p| is_magic_packet_for(p, mac)).count()
    }

    pub fn clear(&self) {
        if let Ok(mut list) = self.received.lock() {
            list.clear();
        }
    }
}

impl Drop for UdpSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// 6 x 0xFF puis 16 répétitions de la MAC, 102 octets exactement
pub fn is_magic_packet_for(payload: &[u8], mac: [u8; 6]) -> bool {
    payload.len() == MAGIC_PACKET_LEN
        && payload[..6].iter().all(|b| *b == 0xFF)
        && payload[6..].chunks(6).all(|c| c == &mac[..])
}
