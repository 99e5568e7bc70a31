//! Widget layout for each screen. Pure rendering: takes `&App`, draws to the
//! given frame, touches nothing else.

use pipeline_types::DocumentKind;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Frame;
use strum::IntoEnumIterator;

use crate::app::{App, Screen, EDITABLE_FIELDS};

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.area());

    match &app.screen {
        Screen::Browsing | Screen::Empty => draw_queue(frame, app, chunks[0]),
        Screen::PickingKind { kind_index } => draw_kind_picker(frame, app, chunks[0], *kind_index),
        Screen::EditingFields { doc_kind, field_index, input } => {
            draw_field_editor(frame, app, chunks[0], *doc_kind, *field_index, input);
        }
    }

    draw_status(frame, app, chunks[1]);
}

fn draw_queue(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .pending_preview()
        .into_iter()
        .map(|(sender, subject)| ListItem::new(format!("{sender}  —  {subject}")))
        .collect();

    let title = format!("Phase 4 manual review ({} pending)", app.pending_count());
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}

fn draw_kind_picker(frame: &mut Frame, app: &App, area: Rect, kind_index: usize) {
    let claim_id = app.claim.as_ref().map(|c| c.item.item_id.as_str()).unwrap_or("?");
    let items: Vec<ListItem> = DocumentKind::iter()
        .enumerate()
        .map(|(i, kind)| {
            let style = if i == kind_index {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(kind.to_string(), style))
        })
        .collect();

    let list =
        List::new(items).block(Block::default().borders(Borders::ALL).title(format!("Classify {claim_id}")));
    frame.render_widget(list, area);
}

fn draw_field_editor(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    doc_kind: DocumentKind,
    field_index: usize,
    input: &str,
) {
    let claim_id = app.claim.as_ref().map(|c| c.item.item_id.as_str()).unwrap_or("?");
    let mut lines = vec![Line::from(format!("{claim_id} -> {doc_kind}")), Line::from("")];

    for (i, name) in EDITABLE_FIELDS.iter().enumerate() {
        let value = if i == field_index {
            input.to_string()
        } else {
            app.fields.get(*name).map(|v| v.as_str().unwrap_or_default().to_string()).unwrap_or_default()
        };
        let style = if i == field_index {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(format!("{name}: {value}"), style)));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Edit fields (Tab next, Enter submit, Esc defer)"));
    frame.render_widget(paragraph, area);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let help = match app.screen {
        Screen::Browsing => "Enter: claim next   q: quit",
        Screen::PickingKind { .. } => "Up/Down: choose kind   Enter: confirm   Esc: defer",
        Screen::EditingFields { .. } => "type to edit   Tab: next field   Enter: submit   Esc: defer",
        Screen::Empty => "nothing pending   q: quit",
    };
    let paragraph = Paragraph::new(format!("{}    [{help}]", app.status))
        .block(Block::default().borders(Borders::ALL).title("status"));
    frame.render_widget(paragraph, area);
}
