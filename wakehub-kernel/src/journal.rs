/**
 * JOURNAL DES ÉVÉNEMENTS - Historique par appareil (ajout, modif, réveil...)
 *
 * FONCTIONNEMENT :
 * - Un fichier JSON lines par jour : <log_dir>/YYYY-MM-DD.log (date UTC)
 * - Nettoyage des fichiers plus vieux que la rétention, au démarrage puis toutes les 24h
 * - Lecture : plus récent d'abord, filtre optionnel par appareil, limite
 */

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::{error, info, warn};

const DATE_FMT: &[time::format_description::FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIMESTAMP_FMT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const CLEANUP_EVERY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: Level,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device: String,
    pub message: String,
}

#[derive(Clone)]
pub struct Journal {
    inner: Arc<JournalInner>,
}

struct JournalInner {
    dir: PathBuf,
    retention_days: u32,
    // sérialise écritures, lectures et nettoyage
    lock: Mutex<()>,
}

impl Journal {
    pub fn open<P: Into<PathBuf>>(dir: P, retention_days: u32) -> Result<Self, JournalError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| JournalError::Io { path: dir.clone(), source })?;
        Ok(Self {
            inner: Arc::new(JournalInner { dir, retention_days, lock: Mutex::new(()) }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn info(&self, device: &str, message: impl Into<String>) {
        let message = message.into();
        info!(device, "{message}");
        self.write(Level::Info, device, message);
    }

    pub fn error(&self, device: &str, message: impl Into<String>) {
        let message = message.into();
        error!(device, "{message}");
        self.write(Level::Error, device, message);
    }

    fn write(&self, level: Level, device: &str, message: String) {
        let now = OffsetDateTime::now_utc();
        let (Ok(day), Ok(timestamp)) = (now.format(DATE_FMT), now.format(TIMESTAMP_FMT)) else {
            warn!("[journal] cannot format current date");
            return;
        };
        let entry = LogEntry { timestamp, level, device: device.to_string(), message };

        let _guard = self.inner.lock.lock();
        let path = self.inner.dir.join(format!("{day}.log"));
        let result = serde_json::to_vec(&entry)
            .map_err(io::Error::from)
            .and_then(|mut line| {
                line.push(b'\n');
                OpenOptions::new().create(true).append(true).open(&path)?.write_all(&line)
            });
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "[journal] write failed");
        }
    }

    /// Supprime les `*.log` datés de `today - retention_days` ou avant. Renvoie le nombre supprimé.
    pub fn cleanup(&self, today: Date) -> usize {
        let _guard = self.inner.lock.lock();
        let Some(cutoff) = today.checked_sub(time::Duration::days(i64::from(self.inner.retention_days))) else {
            return 0;
        };
        let Ok(entries) = fs::read_dir(&self.inner.dir) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(date) = log_file_date(&path) else { continue };
            // jour limite inclus
            if date <= cutoff {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "[journal] cleanup failed"),
                }
            }
        }
        if removed > 0 {
            info!(removed, "[journal] old log files removed");
        }
        removed
    }

    /// Nettoyage au démarrage puis toutes les 24h
    pub fn spawn_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let journal = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_EVERY);
            loop {
                interval.tick().await;
                let journal = journal.clone();
                let today = OffsetDateTime::now_utc().date();
                if let Err(e) = tokio::task::spawn_blocking(move || journal.cleanup(today)).await {
                    warn!(error = %e, "[journal] cleanup task failed");
                }
            }
        })
    }

    /// Entrées les plus récentes d'abord, au plus `limit`.
    pub fn query(&self, device: Option<&str>, limit: usize) -> Result<Vec<LogEntry>, JournalError> {
        let _guard = self.inner.lock.lock();
        let io_err = |path: &Path, source| JournalError::Io { path: path.to_path_buf(), source };

        let mut files: Vec<PathBuf> = fs::read_dir(&self.inner.dir)
            .map_err(|e| io_err(&self.inner.dir, e))?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "log"))
            .collect();
        files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

        let mut out = Vec::new();
        for path in files {
            if out.len() >= limit {
                break;
            }
            let file = match fs::File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "[journal] cannot open log file");
                    continue;
                }
            };
            let mut entries: Vec<LogEntry> = BufReader::new(file)
                .lines()
                .map_while(Result::ok)
                .filter_map(|line| serde_json::from_str::<LogEntry>(&line).ok())
                .filter(|e| device.map_or(true, |d| e.device == d))
                .collect();
            entries.reverse();
            out.extend(entries.into_iter().take(limit - out.len()));
        }
        Ok(out)
    }
}

/// "2024-03-01.log" -> 2024-03-01
fn log_file_date(path: &Path) -> Option<Date> {
    if path.extension()? != "log" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    Date::parse(stem, DATE_FMT).ok()
}
