/**
 * DEVICE STORE - Registre des appareils persisté en JSON
 *
 * RÔLE : Source de vérité des appareils (ordre choisi par l'utilisateur, noms uniques)
 * et de la config serveur (port HTTP, dossier de logs, rétention).
 *
 * FONCTIONNEMENT :
 * - Snapshot complet en mémoire derrière un RwLock (lectures partagées, écritures exclusives)
 * - Chaque mutation valide, applique, puis réécrit le fichier AVANT de relâcher le verrou
 * - Écriture atomique : fichier temporaire voisin + rename
 *
 * LIMITE CONNUE : si l'écriture disque échoue, la mémoire est déjà modifiée ;
 * mémoire et disque divergent jusqu'à la prochaine sauvegarde réussie.
 */

use crate::models::{Device, Snapshot};
use crate::validate::{validate_device, ValidationError};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("device with this name already exists: {0}")]
    DuplicateName(String),
    #[error("device count mismatch: expected {expected}, got {got}")]
    CountMismatch { expected: usize, got: usize },
    #[error("device listed twice: {0}")]
    DuplicateInOrder(String),
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("snapshot file not found: {}", .0.display())]
    SnapshotMissing(PathBuf),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Taxonomie des erreurs, utilisée par la couche HTTP pour choisir le status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Persistence,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Invalid(_) => ErrorKind::Validation,
            StoreError::DuplicateName(_)
            | StoreError::CountMismatch { .. }
            | StoreError::DuplicateInOrder(_) => ErrorKind::Conflict,
            StoreError::DeviceNotFound(_) => ErrorKind::NotFound,
            StoreError::SnapshotMissing(_) | StoreError::Io { .. } | StoreError::Json(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

pub struct DeviceStore {
    path: PathBuf,
    inner: RwLock<Snapshot>,
}

impl DeviceStore {
    /// Store vide (valeurs par défaut) lié à `path`, sans toucher au disque.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            inner: RwLock::new(Snapshot::default()),
        }
    }

    /// Charge le snapshot ; s'il n'existe pas encore, l'initialise avec les défauts et l'écrit.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let store = Self::new(path);
        match store.load() {
            Ok(()) => {}
            Err(StoreError::SnapshotMissing(path)) => {
                info!(path = %path.display(), "no snapshot yet, writing defaults");
                store.save()?;
            }
            Err(e) => return Err(e),
        }
        store.inner.write().fill_defaults();
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Relit le fichier et remplace l'état mémoire d'un bloc.
    pub fn load(&self) -> Result<(), StoreError> {
        let mut snap = self.inner.write();
        let data = fs::read(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::SnapshotMissing(self.path.clone())
            } else {
                StoreError::Io { path: self.path.clone(), source }
            }
        })?;
        let loaded: Snapshot = serde_json::from_slice(&data)?;
        info!(devices = loaded.devices.len(), path = %self.path.display(), "snapshot loaded");
        *snap = loaded;
        Ok(())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let snap = self.inner.read();
        self.persist(&snap)
    }

    /// Appelé avec le verrou tenu par l'appelant.
    fn persist(&self, snap: &Snapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(snap)?;
        let tmp = tmp_path(&self.path);
        let io_err = |source| StoreError::Io { path: self.path.clone(), source };

        let write_tmp = || -> io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&json)?;
            f.sync_all()
        };
        if let Err(e) = write_tmp() {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(e));
        }
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(devices = snap.devices.len(), "snapshot persisted");
        Ok(())
    }

    pub fn add_device(&self, mut device: Device) -> Result<Device, StoreError> {
        let mut snap = self.inner.write();

        validate_device(&device)?;
        device.clear_single_target_if_group();

        if snap.devices.iter().any(|d| d.name == device.name) {
            return Err(StoreError::DuplicateName(device.name));
        }

        snap.devices.push(device.clone());
        self.persist(&snap)?;
        Ok(device)
    }

    /// Remplace l'appareil `old_name` sur place (position conservée), renommage inclus.
    pub fn update_device(&self, old_name: &str, mut device: Device) -> Result<Device, StoreError> {
        let mut snap = self.inner.write();

        validate_device(&device)?;
        device.clear_single_target_if_group();

        if device.name != old_name && snap.devices.iter().any(|d| d.name == device.name) {
            return Err(StoreError::DuplicateName(device.name));
        }

        let slot = snap
            .devices
            .iter_mut()
            .find(|d| d.name == old_name)
            .ok_or_else(|| StoreError::DeviceNotFound(old_name.to_string()))?;
        *slot = device.clone();

        self.persist(&snap)?;
        Ok(device)
    }

    pub fn delete_device(&self, name: &str) -> Result<(), StoreError> {
        let mut snap = self.inner.write();

        let pos = snap
            .devices
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| StoreError::DeviceNotFound(name.to_string()))?;
        snap.devices.remove(pos);

        self.persist(&snap)
    }

    /// `names` doit être exactement une permutation des noms actuels.
    pub fn reorder_devices(&self, names: &[String]) -> Result<(), StoreError> {
        let mut snap = self.inner.write();

        if names.len() != snap.devices.len() {
            return Err(StoreError::CountMismatch { expected: snap.devices.len(), got: names.len() });
        }

        let by_name: HashMap<&str, &Device> =
            snap.devices.iter().map(|d| (d.name.as_str(), d)).collect();
        let mut seen = HashSet::with_capacity(names.len());
        let mut reordered = Vec::with_capacity(names.len());
        for name in names {
            let device = by_name
                .get(name.as_str())
                .ok_or_else(|| StoreError::DeviceNotFound(name.clone()))?;
            if !seen.insert(name.as_str()) {
                return Err(StoreError::DuplicateInOrder(name.clone()));
            }
            reordered.push((*device).clone());
        }

        snap.devices = reordered;
        self.persist(&snap)
    }

    pub fn get_device(&self, name: &str) -> Option<Device> {
        self.inner.read().devices.iter().find(|d| d.name == name).cloned()
    }

    /// Copie défensive de la liste ordonnée.
    pub fn get_all(&self) -> Vec<Device> {
        self.inner.read().devices.clone()
    }

    pub fn get_port(&self) -> u16 {
        self.inner.read().port
    }

    pub fn log_dir(&self) -> String {
        self.inner.read().log_dir.clone()
    }

    pub fn log_retention_days(&self) -> u32 {
        self.inner.read().log_retention_days
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PingMode, SubDevice, DEFAULT_HTTP_PORT};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn device(name: &str, mac: &str) -> Device {
        Device { name: name.into(), mac: mac.into(), port: 9, ..Default::default() }
    }

    fn open_temp() -> (TempDir, DeviceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DeviceStore::open(dir.path().join("wol.json")).unwrap();
        (dir, store)
    }

    fn names(store: &DeviceStore) -> Vec<String> {
        store.get_all().into_iter().map(|d| d.name).collect()
    }

    #[test]
    fn test_open_creates_defaults_file() {
        let (dir, store) = open_temp();
        assert!(dir.path().join("wol.json").exists());
        assert_eq!(store.get_port(), DEFAULT_HTTP_PORT);
        assert_eq!(store.log_dir(), "./logs");
        assert_eq!(store.log_retention_days(), 3);
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn test_load_missing_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeviceStore::new(dir.path().join("absent.json"));
        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::SnapshotMissing(_)));
    }

    #[test]
    fn test_load_corrupt_is_generic_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wol.json");
        fs::write(&path, "{ not json").unwrap();
        let err = DeviceStore::open(&path).err().unwrap();
        assert!(matches!(err, StoreError::Json(_)));
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_open_accepts_free_form_ping_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wol.json");
        fs::write(
            &path,
            r#"{"devices":[
                {"name":"g","sub_devices":[{"mac":"aa:bb:cc:dd:ee:01","port":9}],"ping_mode":""},
                {"name":"h","sub_devices":[{"mac":"aa:bb:cc:dd:ee:02","port":9}],"ping_mode":"majority"},
                {"name":"i","sub_devices":[{"mac":"aa:bb:cc:dd:ee:03","port":9}],"ping_mode":"all"}
            ]}"#,
        )
        .unwrap();

        let store = DeviceStore::open(&path).unwrap();
        assert_eq!(names(&store), vec!["g", "h", "i"]);
        assert_eq!(store.get_device("g").unwrap().ping_mode, None);
        assert_eq!(store.get_device("h").unwrap().ping_mode(), PingMode::Any);
        assert_eq!(store.get_device("i").unwrap().ping_mode(), PingMode::All);

        // réécrit sans les valeurs inconnues
        store.save().unwrap();
        let saved: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(saved["devices"][0].get("ping_mode").is_none());
        assert_eq!(saved["devices"][2]["ping_mode"], "all");
    }

    #[test]
    fn test_open_fills_zero_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wol.json");
        fs::write(&path, r#"{"port":0,"log_dir":"","devices":[]}"#).unwrap();
        let store = DeviceStore::open(&path).unwrap();
        assert_eq!(store.get_port(), DEFAULT_HTTP_PORT);
        assert_eq!(store.log_retention_days(), 3);
    }

    #[test]
    fn test_round_trip_preserves_order_and_scalars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wol.json");
        fs::write(&path, r#"{"port":9000,"log_dir":"/var/log/wol","log_retention_days":7,"devices":[]}"#).unwrap();

        let store = DeviceStore::open(&path).unwrap();
        for (i, name) in ["zeta", "alpha", "mid"].iter().enumerate() {
            store.add_device(device(name, &format!("aa:bb:cc:dd:ee:0{i}"))).unwrap();
        }
        let group = Device {
            name: "rack".into(),
            sub_devices: vec![SubDevice {
                mac: "aa:bb:cc:dd:ee:10".into(),
                ip: "10.0.0.5".into(),
                port: 7,
                broadcast_ip: "10.0.0.255".into(),
                remark: "top".into(),
            }],
            ping_mode: Some(PingMode::All),
            ..Default::default()
        };
        store.add_device(group).unwrap();

        let reloaded = DeviceStore::open(&path).unwrap();
        assert_eq!(reloaded.get_all(), store.get_all());
        assert_eq!(names(&reloaded), vec!["zeta", "alpha", "mid", "rack"]);
        assert_eq!(reloaded.get_port(), 9000);
        assert_eq!(reloaded.log_dir(), "/var/log/wol");
        assert_eq!(reloaded.log_retention_days(), 7);
        assert!(!dir.path().join("wol.json.tmp").exists());
    }

    #[test]
    fn test_duplicate_name_rejected_without_change() {
        let (_dir, store) = open_temp();
        store.add_device(device("pc", "aa:bb:cc:dd:ee:ff")).unwrap();
        let before = store.get_all();

        let err = store.add_device(device("pc", "11:22:33:44:55:66")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName(ref n) if n == "pc"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.get_all(), before);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let (_dir, store) = open_temp();
        store.add_device(device("PC", "aa:bb:cc:dd:ee:ff")).unwrap();
        store.add_device(device("pc", "aa:bb:cc:dd:ee:ff")).unwrap();
        assert_eq!(store.get_all().len(), 2);
    }

    #[test]
    fn test_invalid_device_rejected_before_mutation() {
        let (_dir, store) = open_temp();
        let err = store.add_device(device("pc", "not-a-mac")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn test_group_clears_single_target_fields() {
        let (_dir, store) = open_temp();
        let d = Device {
            name: "rack".into(),
            mac: "aa:bb:cc:dd:ee:ff".into(),
            ip: "10.0.0.1".into(),
            port: 9,
            broadcast_ip: "10.0.0.255".into(),
            sub_devices: vec![SubDevice { mac: "11:22:33:44:55:66".into(), port: 9, ..Default::default() }],
            ..Default::default()
        };
        let stored = store.add_device(d).unwrap();
        assert!(stored.mac.is_empty() && stored.ip.is_empty() && stored.broadcast_ip.is_empty());
        assert_eq!(stored.port, 0);
        assert_eq!(store.get_device("rack").unwrap(), stored);
    }

    #[test]
    fn test_update_in_place_and_rename() {
        let (_dir, store) = open_temp();
        for name in ["a", "b", "c"] {
            store.add_device(device(name, "aa:bb:cc:dd:ee:ff")).unwrap();
        }
        store.update_device("b", device("bee", "11:22:33:44:55:66")).unwrap();
        assert_eq!(names(&store), vec!["a", "bee", "c"]);
        assert_eq!(store.get_device("bee").unwrap().mac, "11:22:33:44:55:66");
        assert!(store.get_device("b").is_none());

        // même nom : pas de conflit avec soi-même
        store.update_device("a", device("a", "22:22:22:22:22:22")).unwrap();
        assert_eq!(names(&store), vec!["a", "bee", "c"]);
    }

    #[test]
    fn test_update_errors() {
        let (_dir, store) = open_temp();
        store.add_device(device("a", "aa:bb:cc:dd:ee:ff")).unwrap();
        store.add_device(device("b", "aa:bb:cc:dd:ee:ff")).unwrap();

        let err = store.update_device("a", device("b", "aa:bb:cc:dd:ee:ff")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName(_)));

        let err = store.update_device("ghost", device("ghost", "aa:bb:cc:dd:ee:ff")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(names(&store), vec!["a", "b"]);
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = open_temp();
        store.add_device(device("a", "aa:bb:cc:dd:ee:ff")).unwrap();
        store.add_device(device("b", "aa:bb:cc:dd:ee:ff")).unwrap();
        store.delete_device("a").unwrap();
        assert_eq!(names(&store), vec!["b"]);
        assert!(matches!(store.delete_device("a"), Err(StoreError::DeviceNotFound(_))));
    }

    #[test]
    fn test_reorder_accepts_only_permutations() {
        let (_dir, store) = open_temp();
        for name in ["a", "b", "c"] {
            store.add_device(device(name, "aa:bb:cc:dd:ee:ff")).unwrap();
        }
        let order = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        store.reorder_devices(&order(&["c", "a", "b"])).unwrap();
        assert_eq!(names(&store), vec!["c", "a", "b"]);

        assert!(matches!(
            store.reorder_devices(&order(&["a", "b"])),
            Err(StoreError::CountMismatch { expected: 3, got: 2 })
        ));
        assert!(matches!(
            store.reorder_devices(&order(&["a", "b", "c", "d"])),
            Err(StoreError::CountMismatch { .. })
        ));
        assert!(matches!(
            store.reorder_devices(&order(&["a", "b", "x"])),
            Err(StoreError::DeviceNotFound(ref n)) if n == "x"
        ));
        assert!(matches!(
            store.reorder_devices(&order(&["a", "a", "b"])),
            Err(StoreError::DuplicateInOrder(ref n)) if n == "a"
        ));
        assert_eq!(names(&store), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_get_all_is_a_copy() {
        let (_dir, store) = open_temp();
        store.add_device(device("a", "aa:bb:cc:dd:ee:ff")).unwrap();
        let mut copy = store.get_all();
        copy[0].name = "mutated".into();
        copy.clear();
        assert_eq!(names(&store), vec!["a"]);
    }

    #[test]
    fn test_failed_persist_keeps_memory_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("state");
        fs::create_dir(&sub).unwrap();
        let store = DeviceStore::open(sub.join("wol.json")).unwrap();
        fs::remove_dir_all(&sub).unwrap();

        let err = store.add_device(device("a", "aa:bb:cc:dd:ee:ff")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(names(&store), vec!["a"]);
    }

    #[test]
    fn test_concurrent_adds_keep_names_unique() {
        let (_dir, store) = open_temp();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    // deux threads par nom
                    store.add_device(device(&format!("dev{}", i % 4), "aa:bb:cc:dd:ee:ff")).is_ok()
                })
            })
            .collect();
        let ok = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(ok, 4);

        let mut all = names(&store);
        all.sort();
        assert_eq!(all, vec!["dev0", "dev1", "dev2", "dev3"]);
    }
}
