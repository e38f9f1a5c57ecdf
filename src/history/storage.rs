use super::model::HistoryItem;
use super::recorder::Draft;
use super::serialization;
use crate::error::ReqbenchError;
use crate::formatter::{self, ResponseType};
use crate::http::{FailureKind, RequestData, ResponseData, ResponseTiming};
use crate::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const HISTORY_FILE: &str = "history.jsonl";
const SEQUENCE_FILE: &str = "history.seq";
const LOCK_FILE: &str = "history.lock";
const SCRATCH_SUFFIX: &str = "tmp";

/// Append-only history log.
///
/// # Layout
/// - `history.jsonl`: one `HistoryItem` per line, in id order.
/// - `history.seq`: the next id to hand out, so ids survive deletion of the
///   newest item and are never reused.
/// - `history.lock`: advisory lock file. Writers hold it exclusively, readers
///   shared. The log itself cannot carry the lock because rewrites replace it.
///
/// # Atomicity
/// A record is one `write_all` of a full line followed by `sync_data`. A crash
/// mid-write leaves a torn last line; readers skip lines that do not decode,
/// and the next append starts on a fresh line. Deletion and eviction write a
/// scratch file and `rename` it over the log, so they land entirely or not at
/// all.
pub struct HistoryStore {
    dir: PathBuf,
    max_items: Option<usize>,
    writer: Mutex<()>,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_items: None,
            writer: Mutex::new(()),
        }
    }

    /// Keep at most `max` items; older ones are evicted on `record`.
    pub fn with_capacity(mut self, max: usize) -> Self {
        self.max_items = Some(max.max(1));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_items(&self) -> Option<usize> {
        self.max_items
    }

    fn log_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    fn seq_path(&self) -> PathBuf {
        self.dir.join(SEQUENCE_FILE)
    }

    /// Ensure directory exists
    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    fn lock_file(&self) -> Result<File> {
        self.ensure_dir()?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.dir.join(LOCK_FILE))?;
        Ok(file)
    }

    /// In-process mutex plus cross-process file lock.
    fn lock_writer(&self) -> Result<(MutexGuard<'_, ()>, File)> {
        let guard = self
            .writer
            .lock()
            .map_err(|_| io::Error::other("history writer lock poisoned"))?;
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;
        Ok((guard, lock))
    }

    /// Records one execution and returns the stored item.
    pub fn record(&self, request: &RequestData, response: &ResponseData) -> Result<HistoryItem> {
        let draft = Draft::new(request, response)?;

        // Unlock happens when the guards drop
        let (_guard, _lock) = self.lock_writer()?;

        let mut items = self.read_all()?;
        let id = self.next_id(&items)?;
        // ids are assigned before the item exists, so a crash here only
        // burns an id
        self.write_sequence(id + 1)?;

        // createdAt never goes backwards, even if the wall clock does
        let now = Utc::now();
        let created_at = items
            .iter()
            .map(|item| item.created_at)
            .max()
            .map_or(now, |newest| newest.max(now));

        let item = draft.into_item(id, created_at);
        items.push(item.clone());

        match self.max_items {
            Some(max) if items.len() > max => {
                // FIFO by creation time
                items.sort_by_key(|item| (item.created_at, item.id));
                let excess = items.len() - max;
                let evicted: Vec<u64> = items.drain(..excess).map(|item| item.id).collect();
                items.sort_by_key(|item| item.id);
                self.rewrite(&items)?;
                info!(id, ?evicted, "history item recorded, oldest evicted");
            }
            _ => {
                self.append_line(&item)?;
                info!(id, "history item recorded");
            }
        }

        Ok(item)
    }

    /// Newest first; `offset` items are skipped, at most `limit` returned.
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<HistoryItem>> {
        let mut items = self.snapshot()?;
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(items.into_iter().skip(offset).take(limit).collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, id: u64) -> Result<HistoryItem> {
        self.snapshot()?
            .into_iter()
            .find(|item| item.id == id)
            .ok_or(ReqbenchError::NotFound(id))
    }

    /// Removes one item. An unknown id changes nothing.
    pub fn delete(&self, id: u64) -> Result<()> {
        let (_guard, _lock) = self.lock_writer()?;

        let mut items = self.read_all()?;
        let Some(pos) = items.iter().position(|item| item.id == id) else {
            return Err(ReqbenchError::NotFound(id));
        };
        items.remove(pos);
        self.rewrite(&items)?;
        info!(id, "history item deleted");
        Ok(())
    }

    /// Rebuilds the response of a stored item, formatted for display.
    pub fn response_of(&self, id: u64) -> Result<ResponseData> {
        let item = self.get(id)?;
        if item.status_code == 0 {
            return Ok(stored_failure(item.response_body));
        }

        let headers = match item.response_headers.as_deref() {
            Some(raw) => serialization::headers_from_string(raw)?,
            None => Default::default(),
        };
        let response = ResponseData::received(
            item.status_code,
            headers,
            item.response_body.unwrap_or_default(),
            ResponseTiming::default(),
        );
        Ok(formatter::apply(&response))
    }

    /// Verifies the store can be locked for writing and its log read.
    pub fn check(&self) -> Result<usize> {
        let (_guard, _lock) = self.lock_writer()?;
        Ok(self.read_all()?.len())
    }

    fn snapshot(&self) -> Result<Vec<HistoryItem>> {
        if !self.log_path().exists() {
            return Ok(Vec::new());
        }
        let lock = self.lock_file()?;
        lock.lock_shared()?;
        self.read_all()
    }

    /// Reads the log; caller holds a lock.
    fn read_all(&self) -> Result<Vec<HistoryItem>> {
        let file = match File::open(self.log_path()) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut raw = Vec::new();
        BufReader::new(file).read_to_end(&mut raw)?;

        let mut items = Vec::new();
        for (index, line) in raw.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let decoded = serde_json::from_slice::<serde_json::Value>(line)
                .map_err(ReqbenchError::from)
                .and_then(|value| HistoryItem::decode(&value));
            match decoded {
                Ok(item) => items.push(item),
                Err(e) => warn!(line = index + 1, error = %e, "skipping unreadable history line"),
            }
        }
        Ok(items)
    }

    fn next_id(&self, items: &[HistoryItem]) -> Result<u64> {
        let from_log = items.iter().map(|item| item.id + 1).max().unwrap_or(1);
        Ok(self.read_sequence()?.max(from_log))
    }

    fn read_sequence(&self) -> Result<u64> {
        match fs::read_to_string(self.seq_path()) {
            Ok(raw) => Ok(raw.trim().parse().unwrap_or_else(|_| {
                warn!(content = raw.trim(), "history sequence file unreadable, derived from log");
                1
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(1),
            Err(e) => Err(e.into()),
        }
    }

    fn write_sequence(&self, next: u64) -> Result<()> {
        replace_atomically(&self.seq_path(), |w| writeln!(w, "{}", next))
    }

    fn append_line(&self, item: &HistoryItem) -> Result<()> {
        let mut line = serde_json::to_string(item)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(self.log_path())?;

        // a torn line from an earlier crash must not swallow this record
        let len = file.metadata()?.len();
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::Start(len - 1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                debug!("history log ends mid-line; starting a new line");
                line.insert(0, '\n');
            }
        }

        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn rewrite(&self, items: &[HistoryItem]) -> Result<()> {
        replace_atomically(&self.log_path(), |w| {
            for item in items {
                let json = serde_json::to_string(item).map_err(io::Error::other)?;
                writeln!(w, "{}", json)?;
            }
            Ok(())
        })
    }
}

/// Rebuilds a failed execution from its stored error message. Items without
/// one get a message that claims no failure kind.
fn stored_failure(message: Option<String>) -> ResponseData {
    let message = message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "no response was recorded".to_string());
    let kind = message
        .split_once(':')
        .and_then(|(prefix, _)| FailureKind::from_prefix(prefix));
    ResponseData {
        status_code: 0,
        headers: BTreeMap::new(),
        body: String::new(),
        formatted_body: None,
        response_type: ResponseType::Raw,
        timing: ResponseTiming::default(),
        error: Some(message),
        failure: kind,
    }
}

/// Writes `path` through a scratch file and `rename`, so readers see either
/// the old content or the new one.
fn replace_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let scratch = path.with_extension(SCRATCH_SUFFIX);
    let file = File::create(&scratch)?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    fs::rename(&scratch, path)?;
    Ok(())
}
