//! Polling fallback transport for contexts that cannot share an in-process
//! channel: every topic is a JSON-lines file and each opener tails it from
//! the offset it had when it opened.
//!
//! The first line of a spool file is a header carrying a random epoch. Once
//! the file grows past its size limit, the next poster rewrites it under a
//! new epoch, keeping only records younger than the retention window.
//! Readers that see the epoch change start over from the header and skip
//! records they were already past.

use crate::bus::envelope::Envelope;
use crate::bus::{Channel, Transport, TransportKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SPOOL_EXTENSION: &str = "jsonl";
const PROBE_FILE_NAME: &str = ".probe";

pub const DEFAULT_SPOOL_MAX_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_SPOOL_RETENTION: Duration = Duration::from_secs(30);

pub fn default_spool_dir() -> PathBuf {
    dirs_next::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("council_projector")
        .join("bus")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpoolLimits {
    /// Size past which the next post compacts the file.
    pub max_bytes: u64,
    /// Records younger than this survive compaction.
    pub retention: Duration,
}

impl Default for SpoolLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_SPOOL_MAX_BYTES,
            retention: DEFAULT_SPOOL_RETENTION,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SpoolHeader {
    epoch: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpoolRecord {
    channel: String,
    posted_at: String,
    envelope: Envelope,
}

impl SpoolRecord {
    fn posted_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.posted_at)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    /// Records from the future (clock skew) count as fresh.
    fn is_fresh(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.posted_at()
            .is_some_and(|at| (now - at).to_std().map_or(true, |age| age <= retention))
    }
}

#[derive(Debug, Clone)]
pub struct SpoolTransport {
    dir: PathBuf,
    limits: SpoolLimits,
}

impl SpoolTransport {
    /// Fails when the directory cannot be created or written.
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("create spool directory {}", dir.display()))?;
        let probe = dir.join(PROBE_FILE_NAME);
        fs::write(&probe, b"ok")
            .with_context(|| format!("probe spool directory {}", dir.display()))?;
        let _ = fs::remove_file(&probe);
        Ok(Self {
            dir,
            limits: SpoolLimits::default(),
        })
    }

    pub fn with_limits(mut self, limits: SpoolLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn limits(&self) -> SpoolLimits {
        self.limits
    }

    pub fn topic_path(&self, topic: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{SPOOL_EXTENSION}", slug::slugify(topic)))
    }
}

impl Transport for SpoolTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Spool
    }

    fn open(&self, topic: &str) -> Result<Box<dyn Channel>> {
        let path = self.topic_path(topic);
        ensure_spool_file(&path)?;
        let mut file =
            File::open(&path).with_context(|| format!("open spool file {}", path.display()))?;
        let header = read_header(&mut file)
            .with_context(|| format!("read spool header {}", path.display()))?;
        let offset = file
            .metadata()
            .with_context(|| format!("stat spool file {}", path.display()))?
            .len();
        let channel_bytes: [u8; 8] = rand::thread_rng().gen();
        Ok(Box::new(SpoolChannel {
            path,
            channel: hex::encode(channel_bytes),
            limits: self.limits,
            epoch: header.map(|header| header.epoch),
            offset,
            last_seen: Utc::now(),
            closed: false,
        }))
    }
}

struct SpoolChannel {
    path: PathBuf,
    channel: String,
    limits: SpoolLimits,
    epoch: Option<String>,
    offset: u64,
    /// Newest `posted_at` this reader has consumed or skipped.
    last_seen: DateTime<Utc>,
    closed: bool,
}

impl SpoolChannel {
    /// Rewrites the file under a new epoch with only the fresh records.
    fn compact(&self) -> Result<()> {
        let content =
            fs::read(&self.path).with_context(|| format!("read spool file {}", self.path.display()))?;
        let now = Utc::now();
        let mut out = header_line()?;
        let mut kept = 0usize;
        for line in content.split(|b| *b == b'\n').filter(|line| !line.is_empty()) {
            let Ok(record) = serde_json::from_slice::<SpoolRecord>(line) else {
                continue;
            };
            if record.is_fresh(now, self.limits.retention) {
                out.extend_from_slice(line);
                out.push(b'\n');
                kept += 1;
            }
        }
        let staging = self
            .path
            .with_extension(format!("{SPOOL_EXTENSION}.{}", self.channel));
        fs::write(&staging, &out)
            .with_context(|| format!("write spool staging file {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("replace spool file {}", self.path.display()))?;
        tracing::debug!(
            path = %self.path.display(),
            before = content.len(),
            after = out.len(),
            kept,
            "spool file compacted"
        );
        Ok(())
    }
}

impl Channel for SpoolChannel {
    fn post(&mut self, envelope: &Envelope) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        ensure_spool_file(&self.path)?;
        let len = fs::metadata(&self.path)
            .with_context(|| format!("stat spool file {}", self.path.display()))?
            .len();
        if len > self.limits.max_bytes {
            self.compact()?;
        }

        let record = SpoolRecord {
            channel: self.channel.clone(),
            posted_at: Utc::now().to_rfc3339(),
            envelope: envelope.clone(),
        };
        let mut line = serde_json::to_string(&record).context("serialize spool record")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open spool file {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append spool file {}", self.path.display()))
    }

    fn drain(&mut self) -> Result<Vec<Envelope>> {
        if self.closed {
            return Ok(Vec::new());
        }
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("open spool file {}", self.path.display()))
            }
        };
        let header = read_header(&mut file)
            .with_context(|| format!("read spool header {}", self.path.display()))?;
        let epoch = header.as_ref().map(|header| header.epoch.as_str());
        let rotated = epoch != self.epoch.as_deref();
        if rotated {
            tracing::debug!(path = %self.path.display(), "spool file compacted; rereading");
            self.epoch = epoch.map(str::to_string);
            self.offset = header.as_ref().map_or(0, |header| header.len);
        }

        file.seek(SeekFrom::Start(self.offset))
            .with_context(|| format!("seek spool file {}", self.path.display()))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .with_context(|| format!("read spool file {}", self.path.display()))?;

        // A trailing line without newline is still being written.
        let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete = &buf[..=last_newline];
        self.offset += complete.len() as u64;

        let mut out = Vec::new();
        for line in complete.split(|b| *b == b'\n').filter(|line| !line.is_empty()) {
            let record = match serde_json::from_slice::<SpoolRecord>(line) {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!(?err, path = %self.path.display(), "skipping malformed spool record");
                    continue;
                }
            };
            let posted_at = record.posted_at();
            let already_past = rotated && posted_at.is_some_and(|at| at <= self.last_seen);
            if let Some(at) = posted_at {
                self.last_seen = self.last_seen.max(at);
            }
            if record.channel != self.channel && !already_past {
                out.push(record.envelope);
            }
        }
        Ok(out)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

struct HeaderLine {
    epoch: String,
    len: u64,
}

fn header_line() -> Result<Vec<u8>> {
    let epoch_bytes: [u8; 8] = rand::thread_rng().gen();
    let mut line = serde_json::to_vec(&SpoolHeader {
        epoch: hex::encode(epoch_bytes),
    })
    .context("serialize spool header")?;
    line.push(b'\n');
    Ok(line)
}

/// Creates the file with a header unless it already exists.
fn ensure_spool_file(path: &Path) -> Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => file
            .write_all(&header_line()?)
            .with_context(|| format!("write spool header {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err).with_context(|| format!("create spool file {}", path.display())),
    }
}

fn read_header(file: &mut File) -> std::io::Result<Option<HeaderLine>> {
    file.seek(SeekFrom::Start(0))?;
    let mut line = Vec::new();
    BufReader::new(&mut *file).read_until(b'\n', &mut line)?;
    if line.last() != Some(&b'\n') {
        return Ok(None);
    }
    Ok(serde_json::from_slice::<SpoolHeader>(&line)
        .ok()
        .map(|header| HeaderLine {
            epoch: header.epoch,
            len: line.len() as u64,
        }))
}
