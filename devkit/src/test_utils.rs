/*!
Test Harness pour le kernel WakeHub

Facilite l'écriture de tests avec:
- Dossier temporaire isolé (snapshot + logs)
- Sink UDP pour capturer les magic packets
- Assertions sur les paquets reçus
*/

use crate::udp_sink::UdpSink;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Harness de test complet : un dossier temporaire + un sink UDP
pub struct TestHarness {
    pub sink: UdpSink,
    dir: TempDir,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    mac: [u8; 6],
    expected_count: usize,
    timeout_ms: u64,
}

impl TestHarness {
    /// Crée un nouveau harness de test
    pub fn new() -> Result<Self> {
        env_logger::builder().is_test(true).try_init().ok(); // Init logging pour tests

        Ok(Self {
            sink: UdpSink::bind()?,
            dir: tempfile::tempdir()?,
            expectations: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Chemin du snapshot (pas encore créé)
    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("wol.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    /// Écrit un snapshot initial brut
    pub fn write_snapshot(&self, snapshot: &serde_json::Value) -> Result<PathBuf> {
        let path = self.store_path();
        std::fs::write(&path, serde_json::to_vec_pretty(snapshot)?)?;
        Ok(path)
    }

    /// Relit le snapshot tel qu'il est sur disque
    pub fn read_snapshot(&self) -> Result<serde_json::Value> {
        let data = std::fs::read(self.store_path())?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// On s'attend à recevoir N magic packets pour cette MAC
    pub fn expect_packets(&mut self, mac: [u8; 6], count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            mac,
            expected_count: count,
            timeout_ms: 3000,
        });
        self
    }

    /// Vérifie toutes les expectations configurées
    pub fn verify_expectations(&self) -> Result<()> {
        log::info!("🔍 Verifying {} expectations...", self.expectations.len());

        for expectation in &self.expectations {
            let total: usize = self.expectations.iter().map(|e| e.expected_count).sum();
            self.sink.wait_for(total, Duration::from_millis(expectation.timeout_ms));

            let actual = self.sink.magic_packets_for(expectation.mac);
            if actual != expectation.expected_count {
                anyhow::bail!(
                    "Expectation failed for MAC {:02x?}: expected {} magic packets, got {}",
                    expectation.mac,
                    expectation.expected_count,
                    actual
                );
            }
            log::info!("✅ MAC {:02x?}: {} packets as expected", expectation.mac, actual);
        }

        Ok(())
    }

    /// Reset le harness pour un nouveau scénario
    pub fn reset(&mut self) {
        self.sink.clear();
        self.expectations.clear();
    }
}
