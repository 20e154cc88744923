pub mod components;
pub mod users;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::AppState;

pub fn render(f: &mut Frame, app: &mut AppState) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5), Constraint::Length(1)])
        .split(f.area());
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(root[1]);

    let p = Paragraph::new(format!(
        "{}  users:{}  | n: new; e/Enter: edit; d: delete; r: refresh; Tab: form; ?: help; q: quit",
        app.api_url,
        app.store.users().len()
    ))
    .block(
        Block::default()
            .title("User directory")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(app.theme.border)),
    )
    .style(Style::default().fg(app.theme.header_fg).bg(app.theme.header_bg));
    f.render_widget(p, root[0]);

    users::render_users_table(f, body[0], app);
    users::render_user_form(f, body[1], app);
    components::render_status_bar(f, root[2], app);

    if let Some(modal) = app.modal.clone() {
        components::render_modal(f, f.area(), app, &modal);
    }
}
