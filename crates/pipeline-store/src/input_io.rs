use anyhow::{Context, Result};
use pipeline_types::WorkItem;

use crate::WorkStore;

impl WorkStore {
    /// Reads one parsed work item by `item_id`, or `None` if no such item
    /// was discovered by the Launcher's scan of `input/`.
    pub fn read_work_item(&self, item_id: &str) -> Result<Option<WorkItem>> {
        let path = self.layout().input_item_path(item_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path.as_std_path())
            .with_context(|| format!("failed to read work item at {path}"))?;
        let item: WorkItem =
            serde_json::from_str(&content).with_context(|| format!("failed to parse work item at {path}"))?;
        Ok(Some(item))
    }

    /// Every work item under `input/`, ordered by `slot`.
    pub fn list_work_items(&self) -> Result<Vec<WorkItem>> {
        let dir = self.layout().input_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        for entry in std::fs::read_dir(dir.as_std_path())? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(entry.path())?;
            items.push(serde_json::from_str::<WorkItem>(&content)?);
        }
        items.sort_by_key(|item| item.slot);
        Ok(items)
    }

    /// The primary document's filename and bytes: the first attachment if
    /// any, otherwise the envelope body as UTF-8 (see DESIGN.md for the
    /// content-hash-basis decision).
    pub fn primary_document(&self, item_id: &str) -> Result<(String, Vec<u8>)> {
        let item = self
            .read_work_item(item_id)?
            .with_context(|| format!("no work item found for {item_id}"))?;
        Ok(primary_document_of(&item))
    }
}

/// Pure half of [`WorkStore::primary_document`], usable by callers that
/// already hold a [`WorkItem`] in memory.
#[must_use]
pub fn primary_document_of(item: &WorkItem) -> (String, Vec<u8>) {
    match item.attachments.first() {
        Some(attachment) => (attachment.filename.clone(), attachment.bytes.clone()),
        None => (format!("{}.txt", item.item_id), item.envelope.body_text.clone().into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use pipeline_types::{Attachment, Envelope};
    use tempfile::TempDir;

    use super::*;

    fn store(dir: &TempDir) -> WorkStore {
        WorkStore::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(), "host-a".to_string())
    }

    fn sample_item(item_id: &str, slot: u64, attachments: Vec<Attachment>) -> WorkItem {
        WorkItem {
            item_id: item_id.to_string(),
            slot,
            envelope: Envelope {
                sender: "Aukro <noreply@aukro.cz>".to_string(),
                recipients: vec!["me@example.com".to_string()],
                subject: "Invoice".to_string(),
                date: "2024-01-01T00:00:00Z".to_string(),
                body_text: "body".to_string(),
            },
            attachments,
        }
    }

    fn write_item(dir: &TempDir, item: &WorkItem) {
        let store = store(dir);
        let path = store.layout().input_item_path(&item.item_id);
        std::fs::create_dir_all(path.parent().unwrap().as_std_path()).unwrap();
        std::fs::write(path.as_std_path(), serde_json::to_string(item).unwrap()).unwrap();
    }

    #[test]
    fn missing_item_reads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).read_work_item("missing").unwrap().is_none());
    }

    #[test]
    fn round_trips_a_written_item() {
        let dir = TempDir::new().unwrap();
        let item = sample_item("item-1", 0, Vec::new());
        write_item(&dir, &item);

        let read_back = store(&dir).read_work_item("item-1").unwrap().unwrap();
        assert_eq!(read_back.item_id, "item-1");
    }

    #[test]
    fn list_work_items_is_slot_ordered() {
        let dir = TempDir::new().unwrap();
        write_item(&dir, &sample_item("item-b", 2, Vec::new()));
        write_item(&dir, &sample_item("item-a", 1, Vec::new()));

        let items = store(&dir).list_work_items().unwrap();
        assert_eq!(items.iter().map(|i| i.item_id.as_str()).collect::<Vec<_>>(), vec!["item-a", "item-b"]);
    }

    #[test]
    fn primary_document_prefers_first_attachment() {
        let attachment = Attachment {
            filename: "invoice.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: vec![1, 2, 3],
        };
        let item = sample_item("item-1", 0, vec![attachment]);
        let (filename, bytes) = primary_document_of(&item);
        assert_eq!(filename, "invoice.pdf");
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn primary_document_falls_back_to_envelope_body() {
        let item = sample_item("item-1", 0, Vec::new());
        let (filename, bytes) = primary_document_of(&item);
        assert_eq!(filename, "item-1.txt");
        assert_eq!(bytes, b"body".to_vec());
    }
}
