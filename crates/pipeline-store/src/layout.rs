use camino::Utf8PathBuf;
use pipeline_types::Phase;

/// Well-known subpaths under a Shared Work Store root.
#[derive(Debug, Clone)]
pub struct WorkStoreLayout {
    root: Utf8PathBuf,
}

impl WorkStoreLayout {
    #[must_use]
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Utf8PathBuf {
        &self.root
    }

    #[must_use]
    pub fn input_dir(&self) -> Utf8PathBuf {
        self.root.join("input")
    }

    /// One parsed work item, keyed by `item_id`.
    #[must_use]
    pub fn input_item_path(&self, item_id: &str) -> Utf8PathBuf {
        self.input_dir().join(format!("{item_id}.json"))
    }

    #[must_use]
    pub fn results_dir(&self, phase: Phase) -> Utf8PathBuf {
        self.root.join("results").join(format!("phase{}", phase.index()))
    }

    #[must_use]
    pub fn artifact_path(&self, phase: Phase, item_id: &str) -> Utf8PathBuf {
        self.results_dir(phase).join(format!("{item_id}.json"))
    }

    #[must_use]
    pub fn failure_stream_path(&self, phase: Phase) -> Utf8PathBuf {
        self.root
            .join("failed")
            .join(format!("phase{}.jsonl", phase.index()))
    }

    #[must_use]
    pub fn deferred_stream_path(&self, phase: Phase) -> Utf8PathBuf {
        self.root
            .join("deferred")
            .join(format!("phase{}.jsonl", phase.index()))
    }

    #[must_use]
    pub fn lock_path(&self, phase: Phase, item_id: &str) -> Utf8PathBuf {
        self.root
            .join("locks")
            .join(format!("phase{}", phase.index()))
            .join(item_id)
    }

    #[must_use]
    pub fn marker_path(&self, phase: Phase) -> Utf8PathBuf {
        self.root
            .join("markers")
            .join(format!("phase{}.done", phase.index()))
    }

    #[must_use]
    pub fn xml_path(&self, item_id: &str) -> Utf8PathBuf {
        self.root.join("xml").join(format!("{item_id}.xml"))
    }

    #[must_use]
    pub fn budget_path(&self, name: &str) -> Utf8PathBuf {
        self.root.join("budget").join(format!("{name}.json"))
    }

    /// Where the launcher records one running instance's PID and claimed
    /// range, so a later `stop` invocation (possibly from a different
    /// process) can find it.
    #[must_use]
    pub fn pid_path(&self, phase: Phase, machine_tag: &str, instance_index: u32) -> Utf8PathBuf {
        self.root
            .join("pids")
            .join(format!("phase{}", phase.index()))
            .join(format!("{machine_tag}-{instance_index}.json"))
    }

    #[must_use]
    pub fn pids_dir(&self, phase: Phase) -> Utf8PathBuf {
        self.root.join("pids").join(format!("phase{}", phase.index()))
    }
}
