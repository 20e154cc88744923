use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use crate::app::{AppState, Focus};
use crate::state::Field;

/// Heading of the form panel for the current mode.
pub fn form_title(app: &AppState) -> &'static str {
    if app.store.form().is_editing() { "Edit user" } else { "New user" }
}

pub fn field_label(field: Field) -> &'static str {
    match field {
        Field::Name => "Name",
        Field::Email => "E-mail",
        Field::Password => "Password",
    }
}

pub fn render_users_table(f: &mut Frame, area: Rect, app: &mut AppState) {
    let body_height = area.height.saturating_sub(3) as usize;
    if body_height > 0 {
        app.rows_per_page = body_height;
    }

    let users = app.store.users();
    let start = (app.selected_index / app.rows_per_page) * app.rows_per_page;
    let end = (start + app.rows_per_page).min(users.len());
    let slice = &users[start.min(end)..end];
    let editing = app.store.form().editing_id();

    let rows = slice.iter().enumerate().map(|(i, u)| {
        let absolute_index = start + i;
        let mut style = Style::default().fg(app.theme.text);
        if absolute_index == app.selected_index && app.focus == Focus::List {
            style = style.fg(app.theme.highlight_fg).bg(app.theme.highlight_bg).add_modifier(Modifier::BOLD);
        }
        if editing == Some(u.id) {
            style = style.add_modifier(Modifier::ITALIC);
        }
        Row::new(vec![
            Cell::from(u.id.to_string()),
            Cell::from(u.name.clone()),
            Cell::from(u.email.clone()),
        ])
        .style(style)
    });

    let widths = [Constraint::Length(6), Constraint::Percentage(45), Constraint::Percentage(55)];
    let header = Row::new(vec!["ID", "NAME", "E-MAIL"])
        .style(Style::default().fg(app.theme.title).add_modifier(Modifier::BOLD));

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title("Users")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .column_spacing(1);

    f.render_widget(table, area);
}

/// Form panel. The password row only exists in create mode.
pub fn render_user_form(f: &mut Frame, area: Rect, app: &AppState) {
    let form = app.store.form();
    let focused = app.focus == Focus::Form;
    let mut lines: Vec<Line> = Vec::new();

    for &field in form.fields() {
        let value = form.value(field).unwrap_or("");
        let shown = if field == Field::Password { "*".repeat(value.chars().count()) } else { value.to_string() };
        let active = focused && app.form_field == field;
        let marker = if active { "▶ " } else { "  " };
        let label_style = if active {
            Style::default().fg(app.theme.highlight_fg).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(app.theme.muted)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{marker}{}: ", field_label(field)), label_style),
            Span::styled(shown, Style::default().fg(app.theme.text)),
        ]));
    }

    lines.push(Line::raw(""));
    let hint = match (focused, form.is_editing()) {
        (true, true) => "Enter: update  Esc: cancel  Tab: next field",
        (true, false) => "Enter: save  Esc: clear  Tab: next field",
        (false, _) => "Tab: focus form",
    };
    lines.push(Line::from(Span::styled(hint, Style::default().fg(app.theme.muted))));

    let border = if focused { app.theme.title } else { app.theme.border };
    let p = Paragraph::new(lines).block(
        Block::default()
            .title(form_title(app))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    );
    f.render_widget(p, area);
}
