//! The Shared Work Store: the filesystem tree that is the pipeline's only
//! coordination mechanism across hosts.

mod artifact_io;
mod claim;
mod failure_stream;
mod input_io;
mod layout;

use camino::Utf8PathBuf;

pub use claim::ClaimOutcome;
pub use input_io::primary_document_of;
pub use layout::WorkStoreLayout;

/// A handle onto one Shared Work Store root, scoped to the current host.
#[derive(Debug, Clone)]
pub struct WorkStore {
    layout: WorkStoreLayout,
    owner_host: String,
}

impl WorkStore {
    #[must_use]
    pub fn new(root: Utf8PathBuf, owner_host: String) -> Self {
        Self {
            layout: WorkStoreLayout::new(root),
            owner_host,
        }
    }

    #[must_use]
    pub fn layout(&self) -> &WorkStoreLayout {
        &self.layout
    }

    #[must_use]
    pub fn owner_host(&self) -> &str {
        &self.owner_host
    }
}
