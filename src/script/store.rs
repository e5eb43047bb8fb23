//! Script store: persists and retrieves saved scripts.

use crate::error::{Result, TestflowError};
use crate::recording::Step;
use crate::script::schema::Script;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default directory where scripts are stored.
fn default_scripts_dir() -> Result<PathBuf> {
    let base = dirs::home_dir().ok_or_else(|| {
        TestflowError::Config("no home directory for script storage".to_string())
    })?;
    Ok(base.join(".testflow").join("scripts"))
}

/// File-backed script storage with an in-memory cache.
///
/// One `<id>.json` per script, written atomically via temp-file rename.
/// Step ordering is preserved exactly as submitted.
pub struct ScriptStore {
    dir: PathBuf,
    scripts: RwLock<HashMap<String, Script>>,
}

impl ScriptStore {
    /// Open a store rooted at `dir`, loading any existing scripts.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let store = Self {
            dir,
            scripts: RwLock::new(HashMap::new()),
        };
        store.load_all()?;
        Ok(store)
    }

    /// Open the store at the default location (~/.testflow/scripts).
    pub fn open_default() -> Result<Self> {
        Self::open(default_scripts_dir()?)
    }

    fn script_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Load all scripts from disk.
    fn load_all(&self) -> Result<()> {
        let mut map = self.scripts.write();

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match load_one(&path) {
                    Ok(script) => {
                        map.insert(script.id.clone(), script);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load script from {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(())
    }

    /// Create and persist a new script from a completed recording.
    pub fn create(
        &self,
        project_id: &str,
        name: &str,
        module: &str,
        steps: Vec<Step>,
    ) -> Result<Script> {
        let script = Script {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            name: name.to_string(),
            module: module.to_string(),
            steps,
            created_at: now_ms(),
        };

        self.write_to_disk(&script)?;
        self.scripts
            .write()
            .insert(script.id.clone(), script.clone());

        tracing::info!(
            "Script saved: id={} name={:?} steps={}",
            script.id,
            script.name,
            script.steps.len()
        );
        Ok(script)
    }

    /// Full overwrite of an existing script (explicit edit/re-save).
    pub fn update(&self, script: Script) -> Result<Script> {
        if !self.scripts.read().contains_key(&script.id) {
            return Err(TestflowError::NotFound(format!("script {}", script.id)));
        }
        self.write_to_disk(&script)?;
        self.scripts
            .write()
            .insert(script.id.clone(), script.clone());
        Ok(script)
    }

    /// List all scripts for a project, newest first (id tie-break so the
    /// order is stable).
    pub fn list(&self, project_id: &str) -> Vec<Script> {
        let mut scripts: Vec<Script> = self
            .scripts
            .read()
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        scripts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        scripts
    }

    /// Get a script by ID.
    pub fn get(&self, id: &str) -> Result<Script> {
        self.scripts
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TestflowError::NotFound(format!("script {}", id)))
    }

    /// Delete a script. Unknown ids, and ids owned by a different project,
    /// report `NotFound` rather than silently succeeding.
    pub fn delete(&self, id: &str, project_id: &str) -> Result<()> {
        {
            let scripts = self.scripts.read();
            match scripts.get(id) {
                Some(s) if s.project_id == project_id => {}
                _ => return Err(TestflowError::NotFound(format!("script {}", id))),
            }
        }

        let path = self.script_path(id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        self.scripts.write().remove(id);

        tracing::info!("Script deleted: id={}", id);
        Ok(())
    }

    fn write_to_disk(&self, script: &Script) -> Result<()> {
        let path = self.script_path(&script.id);
        let content = serde_json::to_string_pretty(script)?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

fn load_one(path: &Path) -> Result<Script> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
