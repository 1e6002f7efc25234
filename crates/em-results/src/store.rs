//! Run storage API.

use crate::types::{BatchManifest, GroupRecord, InitialRecord};
use crate::{ResultsError, ResultsResult};
use em_core::{GroupId, TrajectoryColumns};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const MANIFEST_FILE: &str = "manifest.json";
const GROUPS_FILE: &str = "groups.jsonl";

/// Sink for finished trajectories.
///
/// Each call defines one group holding the five variables `time, y, q, dy,
/// dq` and writes all of them. Writers are shared across worker threads, so
/// a group is either written whole or rejected.
pub trait TrajectoryWriter: Send + Sync {
    fn write_group(&self, group: &GroupId, columns: TrajectoryColumns) -> ResultsResult<()>;
}

/// Validate a group and turn it into its persisted record.
fn define_group(group: &GroupId, columns: TrajectoryColumns) -> ResultsResult<GroupRecord> {
    let name = group.name();
    let reject = |what: String| ResultsError::Definition {
        group: name.clone(),
        what,
    };

    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(reject("invalid group name".to_string()));
    }
    columns.check_lengths().map_err(|e| reject(e.to_string()))?;
    if columns.is_empty() {
        return Err(reject("trajectory has no samples".to_string()));
    }

    let initial = InitialRecord {
        y: columns.y[0],
        dy: columns.dy[0],
        q: columns.q[0],
        dq: columns.dq[0],
    };
    Ok(GroupRecord {
        name,
        index: group.index.index(),
        initial,
        variables: columns,
    })
}

fn ensure_unclaimed(names: &HashSet<String>, name: &str) -> ResultsResult<()> {
    if names.contains(name) {
        return Err(ResultsError::Definition {
            group: name.to_string(),
            what: "group already defined in this batch".to_string(),
        });
    }
    Ok(())
}

/// Sink that can drop bytes written past a given length.
trait Truncate {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }
}

/// Line-oriented append log that never keeps a partial line.
struct LineLog<F> {
    sink: F,
    len: u64,
}

impl<F: Write + Truncate> LineLog<F> {
    fn new(sink: F) -> Self {
        Self { sink, len: 0 }
    }

    /// Append `line` whole, or cut the sink back to its previous length.
    fn append(&mut self, line: &[u8]) -> io::Result<()> {
        match self.sink.write_all(line).and_then(|()| self.sink.flush()) {
            Ok(()) => {
                self.len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = self.sink.truncate_to(self.len) {
                    tracing::error!(error = %cleanup, "could not drop partial group line");
                }
                Err(e)
            }
        }
    }
}

struct BatchState {
    log: LineLog<File>,
    names: HashSet<String>,
}

#[derive(Clone)]
pub struct RunStore {
    root_dir: PathBuf,
}

impl RunStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if root_dir.exists() && !root_dir.is_dir() {
            return Err(ResultsError::InvalidPath {
                message: format!("{} is not a directory", root_dir.display()),
            });
        }
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join(MANIFEST_FILE).exists()
    }

    /// Create (or replace) the run directory of `manifest` and return a
    /// writer appending groups to it.
    pub fn open_batch(&self, manifest: &BatchManifest) -> ResultsResult<BatchWriter> {
        let run_dir = self.run_dir(&manifest.run_id);
        fs::create_dir_all(&run_dir)?;

        let manifest_json = serde_json::to_string_pretty(manifest)?;
        fs::write(run_dir.join(MANIFEST_FILE), manifest_json)?;

        let groups = File::create(run_dir.join(GROUPS_FILE))?;
        Ok(BatchWriter {
            run_dir,
            state: Mutex::new(BatchState {
                log: LineLog::new(groups),
                names: HashSet::new(),
            }),
        })
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<BatchManifest> {
        let manifest_path = self.run_dir(run_id).join(MANIFEST_FILE);

        if !manifest_path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }

        let content = fs::read_to_string(manifest_path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    pub fn load_groups(&self, run_id: &str) -> ResultsResult<Vec<GroupRecord>> {
        let groups_path = self.run_dir(run_id).join(GROUPS_FILE);

        if !groups_path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }

        let content = fs::read_to_string(groups_path)?;
        let mut records = Vec::new();
        for line in content.lines() {
            if !line.trim().is_empty() {
                let record: GroupRecord = serde_json::from_str(line)?;
                records.push(record);
            }
        }

        Ok(records)
    }

    /// Manifests of every run under the root, oldest first.
    pub fn list_runs(&self) -> ResultsResult<Vec<BatchManifest>> {
        let mut runs = Vec::new();

        if !self.root_dir.exists() {
            return Ok(runs);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let run_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&run_id) {
                    runs.push(manifest);
                }
            }
        }

        runs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }
}

/// Appends groups of one batch to `groups.jsonl`, one line per group.
///
/// A group's name is claimed only once its line is fully on disk; a failed
/// append leaves neither bytes nor the name behind.
pub struct BatchWriter {
    run_dir: PathBuf,
    state: Mutex<BatchState>,
}

impl BatchWriter {
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Number of groups accepted so far.
    pub fn group_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .names
            .len()
    }

    /// Sync the groups file to disk.
    pub fn finish(self) -> ResultsResult<()> {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.log.sink.sync_all()?;
        Ok(())
    }
}

impl TrajectoryWriter for BatchWriter {
    fn write_group(&self, group: &GroupId, columns: TrajectoryColumns) -> ResultsResult<()> {
        let record = define_group(group, columns)?;
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ensure_unclaimed(&state.names, &record.name)?;
        state.log.append(line.as_bytes())?;
        state.names.insert(record.name);
        Ok(())
    }
}

/// Keeps groups in memory. Used by tests and for in-process inspection.
#[derive(Default)]
pub struct MemoryWriter {
    names: Mutex<HashSet<String>>,
    groups: Mutex<Vec<GroupRecord>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted groups sorted by batch index.
    pub fn into_groups(self) -> Vec<GroupRecord> {
        let mut groups = self
            .groups
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        groups.sort_by_key(|g| g.index);
        groups
    }

    pub fn len(&self) -> usize {
        self.groups
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrajectoryWriter for MemoryWriter {
    fn write_group(&self, group: &GroupId, columns: TrajectoryColumns) -> ResultsResult<()> {
        let record = define_group(group, columns)?;
        let mut names = self.names.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ensure_unclaimed(&names, &record.name)?;
        names.insert(record.name.clone());
        drop(names);
        self.groups
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
        Ok(())
    }
}
