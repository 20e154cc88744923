//! Shared UI components (status bar, modals).
//!
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::app::keymap::{KeyAction, format_action};
use crate::app::{AppState, InputMode, ModalState, Status};
use crate::sync::DELETE_PROMPT;

/// Render the bottom status bar with mode, in-flight requests and the last message.
pub fn render_status_bar(f: &mut Frame, area: Rect, app: &AppState) {
    let mode = match app.input_mode {
        InputMode::Normal => "LIST",
        InputMode::Editing => "FORM",
        InputMode::Modal => "MODAL",
    };
    let syncing = if app.in_flight > 0 { format!("  syncing({})", app.in_flight) } else { String::new() };
    let mut spans = vec![Span::raw(format!("mode: {mode}  users:{}{syncing}  ", app.store.users().len()))];
    match &app.status {
        Some(Status::Info(msg)) => spans.push(Span::raw(msg.clone())),
        Some(Status::Error(msg)) => spans.push(Span::styled(
            msg.clone(),
            Style::default().fg(app.theme.error_fg).add_modifier(Modifier::BOLD),
        )),
        None => {}
    }
    let p = Paragraph::new(Line::from(spans))
        .style(Style::default().fg(app.theme.status_fg).bg(app.theme.status_bg));
    f.render_widget(p, area);
}

/// Compute a rectangle centered within `area` with a maximum size.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

pub fn render_modal(f: &mut Frame, area: Rect, app: &AppState, state: &ModalState) {
    match state {
        ModalState::DeleteConfirm { id, name, selected } => {
            let rect = centered_rect(56, 7, area);
            let (yes, no) = if *selected == 0 { ("[ Yes ]", "  No  ") } else { ("  Yes  ", "[ No ]") };
            let lines = vec![
                Line::raw(DELETE_PROMPT),
                Line::raw(format!("#{id} {name}")),
                Line::raw(""),
                Line::from(vec![
                    Span::styled(yes, Style::default().fg(app.theme.error_fg)),
                    Span::raw("   "),
                    Span::raw(no),
                ]),
            ];
            let p = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
                Block::default()
                    .title("Delete")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(app.theme.border)),
            );
            f.render_widget(Clear, rect);
            f.render_widget(p, rect);
        }
        ModalState::Info { message } => {
            let width = 50u16.min(area.width.saturating_sub(4)).max(30);
            let approx_lines = (message.len() as u16 / width.saturating_sub(4).max(10)).max(1);
            let rect = centered_rect(width, approx_lines + 4, area);
            let p = Paragraph::new(message.clone()).wrap(Wrap { trim: false }).block(
                Block::default()
                    .title("Info")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(app.theme.border)),
            );
            f.render_widget(Clear, rect);
            f.render_widget(p, rect);
        }
        ModalState::Help => render_help_modal(f, area, app),
    }
}

/// Keybindings as resolved from the active keymap, plus form keys.
fn render_help_modal(f: &mut Frame, area: Rect, app: &AppState) {
    let rect = centered_rect(60, 20, area);
    let mut lines = vec![
        Line::from(Span::styled("List", Style::default().add_modifier(Modifier::BOLD))),
    ];
    for action in [
        KeyAction::NewUser,
        KeyAction::EditSelection,
        KeyAction::DeleteSelection,
        KeyAction::Refresh,
        KeyAction::ShowDetails,
        KeyAction::ToggleFocus,
        KeyAction::MoveUp,
        KeyAction::MoveDown,
        KeyAction::PageUp,
        KeyAction::PageDown,
        KeyAction::Quit,
    ] {
        let keys = app.keymap.keys_for(action).join(", ");
        lines.push(Line::from(vec![
            Span::raw(format!("  {:<16}", format_action(action))),
            Span::styled(keys, Style::default().add_modifier(Modifier::ITALIC)),
        ]));
    }
    lines.push(Line::raw(""));
    lines.push(Line::from(Span::styled("Form", Style::default().add_modifier(Modifier::BOLD))));
    for (label, keys) in [
        ("Submit", "Enter"),
        ("Cancel", "Esc"),
        ("Next field", "Tab, Down"),
        ("Previous field", "BackTab, Up"),
    ] {
        lines.push(Line::from(vec![
            Span::raw(format!("  {label:<16}")),
            Span::styled(keys, Style::default().add_modifier(Modifier::ITALIC)),
        ]));
    }
    let p = Paragraph::new(lines).block(
        Block::default()
            .title("Help")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(app.theme.border)),
    );
    f.render_widget(Clear, rect);
    f.render_widget(p, rect);
}
