//! Terminal UI driving [`pipeline_phases::ManualReviewQueue`] for Phase 4
//! manual document review.
//!
//! This crate owns the terminal lifecycle; [`app::App`] owns the review
//! state machine and [`ui::draw`] owns rendering. [`run`] is the only entry
//! point callers need.

mod app;
mod ui;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::execute;
use pipeline_phases::ManualReviewQueue;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

pub use app::App;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Runs the review loop to completion (the reviewer quits with `q`). Blocks
/// the calling thread; callers inside an async runtime should run this on a
/// blocking task.
pub fn run(queue: ManualReviewQueue) -> Result<()> {
    enable_raw_mode().context("failed to enable terminal raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to initialize terminal")?;

    tracing::info!("entering phase 4 review loop");
    let mut app = App::new(queue);
    let result = run_loop(&mut terminal, &mut app);
    tracing::info!("leaving phase 4 review loop");

    disable_raw_mode().context("failed to disable terminal raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to restore cursor")?;

    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::draw(frame, app))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }

        let Event::Key(key) = event::read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        handle_key(app, key.code);
    }
    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode) {
    use app::Screen;

    match &app.screen {
        Screen::Browsing | Screen::Empty => match code {
            KeyCode::Char('q') => app.quit(),
            KeyCode::Enter => app.claim_next(),
            _ => {}
        },
        Screen::PickingKind { .. } => match code {
            KeyCode::Up => app.cycle_kind(-1),
            KeyCode::Down => app.cycle_kind(1),
            KeyCode::Enter => app.confirm_kind(),
            KeyCode::Esc => app.defer_current(),
            _ => {}
        },
        Screen::EditingFields { .. } => match code {
            KeyCode::Tab => app.cycle_field(1),
            KeyCode::Enter => app.submit_classified(),
            KeyCode::Esc => app.defer_current(),
            KeyCode::Backspace => app.backspace(),
            KeyCode::Char(c) => app.type_char(c),
            _ => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use pipeline_phases::ManualReviewQueue;
    use pipeline_types::{Envelope, FailureRecord, Phase, WorkItem};
    use pipeline_store::WorkStore;
    use tempfile::TempDir;

    use crate::app::{App, Screen};
    use crate::handle_key;
    use crossterm::event::KeyCode;

    fn queue_with_one_pending(dir: &TempDir) -> ManualReviewQueue {
        let store = Arc::new(WorkStore::new(
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            "host-a".to_string(),
        ));
        let item = WorkItem {
            item_id: "item-1".to_string(),
            slot: 0,
            envelope: Envelope {
                sender: "a@b.com".to_string(),
                recipients: vec!["me@example.com".to_string()],
                subject: "subject".to_string(),
                date: "2024-01-01T00:00:00Z".to_string(),
                body_text: "body".to_string(),
            },
            attachments: Vec::new(),
        };
        let path = store.layout().input_item_path(&item.item_id);
        std::fs::create_dir_all(path.parent().unwrap().as_std_path()).unwrap();
        std::fs::write(path.as_std_path(), serde_json::to_string(&item).unwrap()).unwrap();
        store
            .append_failure(&FailureRecord::new("item-1", Phase::Phase3, "model_unparseable", "..."))
            .unwrap();

        ManualReviewQueue::new(store, Duration::from_secs(600))
    }

    #[test]
    fn claim_moves_to_kind_picker() {
        let dir = TempDir::new().unwrap();
        let mut app = App::new(queue_with_one_pending(&dir));
        app.claim_next();
        assert!(matches!(app.screen, Screen::PickingKind { kind_index: 0 }));
    }

    #[test]
    fn picking_kind_then_submitting_writes_artifact() {
        let dir = TempDir::new().unwrap();
        let store_root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let mut app = App::new(queue_with_one_pending(&dir));

        app.claim_next();
        handle_key(&mut app, KeyCode::Enter); // confirm kind (first variant)
        handle_key(&mut app, KeyCode::Enter); // submit with no typed fields

        let store = WorkStore::new(store_root, "host-a".to_string());
        assert!(store.read_artifact(Phase::Phase4, "item-1").unwrap().is_some());
        assert!(matches!(app.screen, Screen::Browsing));
    }

    #[test]
    fn escape_during_kind_picking_defers_without_writing() {
        let dir = TempDir::new().unwrap();
        let store_root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let mut app = App::new(queue_with_one_pending(&dir));

        app.claim_next();
        handle_key(&mut app, KeyCode::Esc);

        let store = WorkStore::new(store_root, "host-a".to_string());
        assert!(store.read_artifact(Phase::Phase4, "item-1").unwrap().is_none());
    }

    #[test]
    fn typed_field_is_carried_into_the_artifact() {
        let dir = TempDir::new().unwrap();
        let store_root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let mut app = App::new(queue_with_one_pending(&dir));

        app.claim_next();
        handle_key(&mut app, KeyCode::Enter); // confirm kind
        for c in "utility".chars() {
            handle_key(&mut app, KeyCode::Char(c));
        }
        handle_key(&mut app, KeyCode::Enter); // submit

        let store = WorkStore::new(store_root, "host-a".to_string());
        let artifact = store.read_artifact(Phase::Phase4, "item-1").unwrap().unwrap();
        assert_eq!(artifact.fields["category"], serde_json::json!("utility"));
    }
}
