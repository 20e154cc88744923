use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

use crate::api::{UserId, UserRecord};
use crate::app::keymap::KeyAction;
use crate::app::{AppState, Focus, InputMode, ModalState, Status};
use crate::error::SyncError;
use crate::state::{Action, Applied, Field, RefreshTicket};
use crate::sync::{Answer, Mutation, SyncEngine, gate_delete};
use crate::ui;

/// Work the event loop hands to the sync engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Mutate(Mutation),
    Refresh,
    Inspect(UserId),
}

/// Completion of a dispatched request, delivered back to the UI thread.
#[derive(Debug)]
pub enum SyncEvent {
    Mutated {
        mutation: Mutation,
        result: Result<(), SyncError>,
    },
    Refreshed {
        ticket: RefreshTicket,
        result: Result<Vec<UserRecord>, SyncError>,
    },
    Inspected {
        id: UserId,
        result: Result<UserRecord, SyncError>,
    },
}

/// Drive the TUI until the operator quits.
///
/// Requests run as tasks on `runtime`; their results come back over a
/// channel and are applied here, between frames, so `app` has one owner.
pub fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    runtime: &Handle,
    engine: SyncEngine,
    mut app: AppState,
) -> Result<()> {
    let (tx, mut rx) = unbounded_channel();
    dispatch(&mut app, Command::Refresh, runtime, &engine, &tx);

    loop {
        while let Ok(ev) = rx.try_recv() {
            if let Some(cmd) = apply_event(&mut app, ev) {
                dispatch(&mut app, cmd, runtime, &engine, &tx);
            }
        }

        terminal.draw(|f| {
            ui::render(f, &mut app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match handle_key(&mut app, key) {
                        Some(Command::Quit) => break,
                        Some(cmd) => dispatch(&mut app, cmd, runtime, &engine, &tx),
                        None => {}
                    }
                }
            }
        }
    }

    Ok(())
}

/// Spawn the request behind `cmd`. Completion arrives as a [`SyncEvent`].
pub fn dispatch(
    app: &mut AppState,
    cmd: Command,
    runtime: &Handle,
    engine: &SyncEngine,
    tx: &UnboundedSender<SyncEvent>,
) {
    match cmd {
        Command::Quit => {}
        Command::Mutate(mutation) => {
            tracing::debug!(?mutation, "dispatch mutation");
            app.in_flight += 1;
            let engine = engine.clone();
            let tx = tx.clone();
            runtime.spawn(async move {
                let result = engine.mutate(&mutation).await;
                let _ = tx.send(SyncEvent::Mutated { mutation, result });
            });
        }
        Command::Refresh => {
            let ticket = app.store.issue_ticket();
            tracing::debug!(?ticket, "dispatch refresh");
            app.in_flight += 1;
            let engine = engine.clone();
            let tx = tx.clone();
            runtime.spawn(async move {
                let result = engine.refresh().await;
                let _ = tx.send(SyncEvent::Refreshed { ticket, result });
            });
        }
        Command::Inspect(id) => {
            app.in_flight += 1;
            let engine = engine.clone();
            let tx = tx.clone();
            runtime.spawn(async move {
                let result = engine.fetch_one(id).await;
                let _ = tx.send(SyncEvent::Inspected { id, result });
            });
        }
    }
}

/// Fold a completed request into the app. A successful write asks for a refresh.
pub fn apply_event(app: &mut AppState, ev: SyncEvent) -> Option<Command> {
    app.in_flight = app.in_flight.saturating_sub(1);
    match ev {
        SyncEvent::Mutated { mutation, result: Ok(()) } => {
            if mutation.resets_form() {
                app.store.apply(Action::Reset);
                app.form_field = Field::Name;
                if app.input_mode == InputMode::Editing {
                    app.input_mode = InputMode::Normal;
                    app.focus = Focus::List;
                }
            }
            app.status = Some(Status::Info(mutation.describe()));
            Some(Command::Refresh)
        }
        SyncEvent::Mutated { mutation, result: Err(e) } => {
            let what = match mutation {
                Mutation::Delete(_) => "delete failed",
                Mutation::Submit(_) => "save failed",
            };
            app.status = Some(Status::Error(format!("{what}: {e}")));
            None
        }
        SyncEvent::Refreshed { ticket, result: Ok(records) } => {
            match app.store.apply(Action::Load { ticket, records }) {
                Applied::Changed => app.clamp_selection(),
                Applied::Stale => tracing::debug!(?ticket, "discarded stale refresh"),
            }
            None
        }
        SyncEvent::Refreshed { result: Err(e), .. } => {
            app.status = Some(Status::Error(format!("refresh failed: {e}")));
            None
        }
        SyncEvent::Inspected { result: Ok(user), .. } => {
            open_modal(app, ModalState::Info { message: describe_user(&user) });
            None
        }
        SyncEvent::Inspected { id, result: Err(e) } => {
            app.status = Some(Status::Error(format!("could not load user {id}: {e}")));
            None
        }
    }
}

/// Translate one key press into state changes and, maybe, a command.
pub fn handle_key(app: &mut AppState, key: KeyEvent) -> Option<Command> {
    if app.modal.is_some() {
        return handle_modal_key(app, key.code);
    }
    match app.input_mode {
        InputMode::Editing => handle_form_key(app, key),
        InputMode::Normal | InputMode::Modal => handle_list_key(app, key),
    }
}

fn handle_list_key(app: &mut AppState, key: KeyEvent) -> Option<Command> {
    let action = app.keymap.resolve(&key)?;
    let len = app.store.users().len();
    match action {
        KeyAction::Quit => return Some(Command::Quit),
        KeyAction::OpenHelp => open_modal(app, ModalState::Help),
        KeyAction::NewUser => {
            app.store.apply(Action::Reset);
            enter_form(app);
        }
        KeyAction::EditSelection => {
            if let Some(user) = app.selected_user().cloned() {
                app.store.apply(Action::BeginEdit(user));
                enter_form(app);
            }
        }
        KeyAction::DeleteSelection => {
            if let Some(user) = app.selected_user() {
                let modal = ModalState::DeleteConfirm {
                    id: user.id,
                    name: user.name.clone(),
                    selected: 1,
                };
                open_modal(app, modal);
            }
        }
        KeyAction::Refresh => return Some(Command::Refresh),
        KeyAction::ShowDetails => return app.selected_user().map(|u| Command::Inspect(u.id)),
        KeyAction::ToggleFocus => {
            app.focus = Focus::Form;
            app.input_mode = InputMode::Editing;
            ensure_field_valid(app);
        }
        KeyAction::MoveUp => app.selected_index = app.selected_index.saturating_sub(1),
        KeyAction::MoveDown => {
            if app.selected_index + 1 < len {
                app.selected_index += 1;
            }
        }
        KeyAction::PageUp => {
            app.selected_index = app.selected_index.saturating_sub(app.rows_per_page.max(1));
        }
        KeyAction::PageDown => {
            let new_idx = app.selected_index.saturating_add(app.rows_per_page.max(1));
            app.selected_index = new_idx.min(len.saturating_sub(1));
        }
        KeyAction::Ignore => {}
    }
    None
}

fn handle_form_key(app: &mut AppState, key: KeyEvent) -> Option<Command> {
    ensure_field_valid(app);
    match key.code {
        KeyCode::Esc => {
            app.store.apply(Action::Reset);
            leave_form(app);
            app.status = Some(Status::Info("cancelled".to_string()));
        }
        KeyCode::Tab | KeyCode::Down => step_field(app, 1),
        KeyCode::BackTab | KeyCode::Up => step_field(app, -1),
        KeyCode::Enter => match app.store.form().submission() {
            Ok(submission) => {
                app.status = Some(Status::Info("saving…".to_string()));
                return Some(Command::Mutate(Mutation::Submit(submission)));
            }
            Err(e) => {
                if let SyncError::IncompleteDraft(field) = &e {
                    app.form_field = *field;
                }
                app.status = Some(Status::Error(e.to_string()));
            }
        },
        KeyCode::Backspace => {
            let mut value = app.store.form().value(app.form_field).unwrap_or("").to_string();
            value.pop();
            app.store.update_draft_field(app.form_field, value);
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let mut value = app.store.form().value(app.form_field).unwrap_or("").to_string();
            value.push(c);
            app.store.update_draft_field(app.form_field, value);
        }
        _ => {}
    }
    None
}

fn handle_modal_key(app: &mut AppState, code: KeyCode) -> Option<Command> {
    match app.modal.as_mut() {
        Some(ModalState::DeleteConfirm { id, selected, .. }) => {
            let id = *id;
            let answer = match code {
                KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                    *selected = if *selected == 0 { 1 } else { 0 };
                    return None;
                }
                KeyCode::Char('y') | KeyCode::Char('Y') => true,
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => false,
                KeyCode::Enter => *selected == 0,
                _ => return None,
            };
            close_modal(app);
            gate_delete(id, &Answer(answer)).map(Command::Mutate)
        }
        Some(ModalState::Info { .. }) | Some(ModalState::Help) => {
            if matches!(code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('?')) {
                close_modal(app);
            }
            None
        }
        None => None,
    }
}

fn describe_user(user: &UserRecord) -> String {
    let mut out = format!("#{} {}\n{}", user.id, user.name, user.email);
    if let Some(created) = &user.created_at {
        out.push_str(&format!("\ncreated: {created}"));
    }
    if let Some(updated) = &user.updated_at {
        out.push_str(&format!("\nupdated: {updated}"));
    }
    out
}

fn enter_form(app: &mut AppState) {
    app.focus = Focus::Form;
    app.input_mode = InputMode::Editing;
    app.form_field = Field::Name;
}

fn leave_form(app: &mut AppState) {
    app.focus = Focus::List;
    app.input_mode = InputMode::Normal;
    app.form_field = Field::Name;
}

fn open_modal(app: &mut AppState, modal: ModalState) {
    app.modal = Some(modal);
    app.input_mode = InputMode::Modal;
}

fn close_modal(app: &mut AppState) {
    app.modal = None;
    app.input_mode = if app.focus == Focus::Form { InputMode::Editing } else { InputMode::Normal };
}

fn ensure_field_valid(app: &mut AppState) {
    if !app.store.form().fields().contains(&app.form_field) {
        app.form_field = Field::Name;
    }
}

fn step_field(app: &mut AppState, delta: isize) {
    let fields = app.store.form().fields();
    let pos = fields.iter().position(|f| *f == app.form_field).unwrap_or(0) as isize;
    let next = (pos + delta).rem_euclid(fields.len() as isize) as usize;
    app.form_field = fields[next];
}
