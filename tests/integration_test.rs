// Integration tests for userdir-client
//
// The remote service is replaced by an in-memory `UsersApi` so the full
// mutate-then-refresh cycle, the TUI key handling and rendering can be
// exercised without a network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pretty_assertions::assert_eq;
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use tokio::runtime::Handle;
use tokio::sync::mpsc::unbounded_channel;

use userdir_client::SyncError;
use userdir_client::api::{NewUser, UserId, UserRecord, UserUpdate, UsersApi};
use userdir_client::app::update::{Command, apply_event, dispatch, handle_key};
use userdir_client::app::{AppState, InputMode, ModalState, Status};
use userdir_client::journey::{self, JourneyConfig};
use userdir_client::state::{DirectoryState, Field, FormState, RefreshOrdering};
use userdir_client::sync::{Answer, RemoveOutcome, SyncEngine};
use userdir_client::ui;

#[derive(Default)]
struct FakeInner {
    users: Vec<(UserRecord, String)>,
    next_id: UserId,
    calls: Vec<String>,
    update_bodies: Vec<serde_json::Value>,
    fail: bool,
}

/// In-memory user service. Stores passwords so tests can check they never change.
#[derive(Default)]
struct FakeUsersApi {
    inner: Mutex<FakeInner>,
}

impl FakeUsersApi {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn set_failing(&self, fail: bool) {
        self.inner.lock().unwrap().fail = fail;
    }

    fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    fn password_of(&self, id: UserId) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.users.iter().find(|(u, _)| u.id == id).map(|(_, p)| p.clone())
    }

    fn update_bodies(&self) -> Vec<serde_json::Value> {
        self.inner.lock().unwrap().update_bodies.clone()
    }

    fn begin(&self, call: String) -> Result<std::sync::MutexGuard<'_, FakeInner>, SyncError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        if inner.fail {
            return Err(SyncError::Transport("connection refused".into()));
        }
        Ok(inner)
    }
}

fn not_found() -> SyncError {
    SyncError::Rejected { status: 404, detail: Some("Usuário não encontrado".into()) }
}

#[async_trait]
impl UsersApi for FakeUsersApi {
    async fn list(&self) -> Result<Vec<UserRecord>, SyncError> {
        let inner = self.begin("GET /users".into())?;
        Ok(inner.users.iter().map(|(u, _)| u.clone()).collect())
    }

    async fn get(&self, id: UserId) -> Result<UserRecord, SyncError> {
        let inner = self.begin(format!("GET /users/{id}"))?;
        inner.users.iter().find(|(u, _)| u.id == id).map(|(u, _)| u.clone()).ok_or_else(not_found)
    }

    async fn create(&self, user: &NewUser) -> Result<UserRecord, SyncError> {
        let mut inner = self.begin("POST /users".into())?;
        if inner.users.iter().any(|(u, _)| u.email == user.email) {
            return Err(SyncError::Rejected { status: 400, detail: Some("Email já cadastrado".into()) });
        }
        inner.next_id += 1;
        let record = UserRecord {
            id: inner.next_id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: Some("2023-11-14T22:13:20".into()),
            updated_at: None,
        };
        inner.users.push((record.clone(), user.password.clone()));
        Ok(record)
    }

    async fn update(&self, id: UserId, changes: &UserUpdate) -> Result<UserRecord, SyncError> {
        let mut inner = self.begin(format!("PUT /users/{id}"))?;
        let body = serde_json::to_value(changes).map_err(|e| SyncError::Transport(e.to_string()))?;
        inner.update_bodies.push(body);
        let (record, _) = inner.users.iter_mut().find(|(u, _)| u.id == id).ok_or_else(not_found)?;
        record.name = changes.name.clone();
        record.email = changes.email.clone();
        record.updated_at = Some("2023-11-14T22:14:00".into());
        Ok(record.clone())
    }

    async fn delete(&self, id: UserId) -> Result<(), SyncError> {
        let mut inner = self.begin(format!("DELETE /users/{id}"))?;
        let before = inner.users.len();
        inner.users.retain(|(u, _)| u.id != id);
        if inner.users.len() == before { Err(not_found()) } else { Ok(()) }
    }
}

fn engine_for(api: &Arc<FakeUsersApi>) -> SyncEngine {
    SyncEngine::new(api.clone())
}

const NAME: &str = "Usuário Teste 1700000000000";
const EMAIL: &str = "teste.1700000000000@example.com";
const PASSWORD: &str = "senha123";
const NEW_NAME: &str = "Usuário Atualizado 1700000000000";

fn fill_create_form(state: &mut DirectoryState, name: &str, email: &str, password: &str) {
    state.update_draft_field(Field::Name, name);
    state.update_draft_field(Field::Email, email);
    state.update_draft_field(Field::Password, password);
}

// 1) Create round trip: submit, reset, and the record shows up after re-read
#[tokio::test]
async fn create_round_trip_resets_form_and_lists_record() {
    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut state = DirectoryState::default();
    engine.fetch_all(&mut state).await.unwrap();
    assert!(state.users().is_empty());

    fill_create_form(&mut state, NAME, EMAIL, PASSWORD);
    engine.submit(&mut state).await.unwrap();

    assert_eq!(state.form(), &FormState::default());
    assert_eq!(state.users().len(), 1);
    assert_eq!(state.users()[0].name, NAME);
    assert_eq!(state.users()[0].email, EMAIL);
    assert_eq!(api.calls(), vec!["GET /users", "POST /users", "GET /users"]);
}

// 2) Update is scoped to name and email; the password survives untouched
#[tokio::test]
async fn update_never_sends_or_changes_password() {
    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut state = DirectoryState::default();
    fill_create_form(&mut state, NAME, EMAIL, PASSWORD);
    engine.submit(&mut state).await.unwrap();

    let record = state.users()[0].clone();
    state.begin_edit(&record);
    state.update_draft_field(Field::Name, NEW_NAME);
    state.update_draft_field(Field::Password, "ignored");
    engine.submit(&mut state).await.unwrap();

    assert_eq!(state.users()[0].name, NEW_NAME);
    assert_eq!(state.users()[0].email, EMAIL);
    assert_eq!(api.password_of(record.id).as_deref(), Some(PASSWORD));
    let bodies = api.update_bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0], serde_json::json!({ "name": NEW_NAME, "email": EMAIL }));
    assert!(bodies[0].get("password").is_none());
    assert!(!state.form().is_editing());
}

// 3) Deleted records are gone from the re-read and from the service
#[tokio::test]
async fn delete_is_final() {
    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut state = DirectoryState::default();
    fill_create_form(&mut state, NAME, EMAIL, PASSWORD);
    engine.submit(&mut state).await.unwrap();
    let id = state.users()[0].id;

    let outcome = engine.remove(&mut state, id, &Answer(true)).await.unwrap();
    assert_eq!(outcome, RemoveOutcome::Deleted);
    assert!(state.users().iter().all(|u| u.id != id));
    assert!(matches!(engine.fetch_one(id).await, Err(SyncError::Rejected { status: 404, .. })));
}

// 4) A declined confirmation sends nothing and changes nothing
#[tokio::test]
async fn declined_remove_sends_no_request() {
    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut state = DirectoryState::default();
    fill_create_form(&mut state, NAME, EMAIL, PASSWORD);
    engine.submit(&mut state).await.unwrap();
    let id = state.users()[0].id;
    api.clear_calls();
    let before = state.clone();

    let outcome = engine.remove(&mut state, id, &Answer(false)).await.unwrap();
    assert_eq!(outcome, RemoveOutcome::Declined);
    assert!(api.calls().is_empty());
    assert_eq!(state, before);
}

// 5) Failed writes leave state exactly as it was and trigger no re-read
#[tokio::test]
async fn failed_mutation_leaves_state_untouched() {
    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut state = DirectoryState::default();
    fill_create_form(&mut state, NAME, EMAIL, PASSWORD);
    engine.submit(&mut state).await.unwrap();

    let record = state.users()[0].clone();
    state.begin_edit(&record);
    state.update_draft_field(Field::Name, NEW_NAME);
    let before = state.clone();
    api.clear_calls();
    api.set_failing(true);

    let err = engine.submit(&mut state).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert_eq!(state, before);
    assert_eq!(api.calls(), vec![format!("PUT /users/{}", record.id)]);

    let err = engine.remove(&mut state, record.id, &Answer(true)).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert_eq!(state, before);
}

// 6) Service rejections carry the detail message through
#[tokio::test]
async fn duplicate_email_is_rejected_with_detail() {
    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut state = DirectoryState::default();
    fill_create_form(&mut state, NAME, EMAIL, PASSWORD);
    engine.submit(&mut state).await.unwrap();

    fill_create_form(&mut state, "Outro", EMAIL, PASSWORD);
    let before = state.clone();
    let err = engine.submit(&mut state).await.unwrap_err();
    assert_eq!(err.to_string(), "rejected by service (HTTP 400): Email já cadastrado");
    assert_eq!(state, before);
}

// 7) An incomplete draft never reaches the service
#[tokio::test]
async fn incomplete_draft_is_not_sent() {
    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut state = DirectoryState::default();
    state.update_draft_field(Field::Name, NAME);
    state.update_draft_field(Field::Email, EMAIL);

    let err = engine.submit(&mut state).await.unwrap_err();
    assert_eq!(err, SyncError::IncompleteDraft(Field::Password));
    assert!(api.calls().is_empty());
}

// 8) Overlapping refreshes: the latest-issued read wins regardless of arrival order
#[tokio::test]
async fn out_of_order_refresh_results_respect_ordering() {
    use userdir_client::state::{Action, Applied};

    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut state = DirectoryState::new(RefreshOrdering::LatestIssued);

    let early = state.issue_ticket();
    let early_records = engine.refresh().await.unwrap();
    fill_create_form(&mut state, NAME, EMAIL, PASSWORD);
    let submission = state.form().submission().unwrap();
    engine.mutate(&userdir_client::sync::Mutation::Submit(submission)).await.unwrap();
    let late = state.issue_ticket();
    let late_records = engine.refresh().await.unwrap();

    assert_eq!(state.apply(Action::Load { ticket: late, records: late_records.clone() }), Applied::Changed);
    assert_eq!(state.apply(Action::Load { ticket: early, records: early_records.clone() }), Applied::Stale);
    assert_eq!(state.users(), late_records.as_slice());

    let mut lww = DirectoryState::new(RefreshOrdering::LastCompleted);
    let a = lww.issue_ticket();
    let b = lww.issue_ticket();
    lww.apply(Action::Load { ticket: b, records: late_records });
    assert_eq!(lww.apply(Action::Load { ticket: a, records: early_records }), Applied::Changed);
    assert!(lww.users().is_empty());
}

fn press(app: &mut AppState, code: KeyCode) -> Option<Command> {
    handle_key(app, KeyEvent::new(code, KeyModifiers::NONE))
}

fn type_str(app: &mut AppState, s: &str) {
    for c in s.chars() {
        press(app, KeyCode::Char(c));
    }
}

/// Dispatch `cmd` on the current runtime and fold results back in until no
/// follow-up command remains.
async fn settle(app: &mut AppState, engine: &SyncEngine, cmd: Command) {
    let (tx, mut rx) = unbounded_channel();
    let handle = Handle::current();
    let mut pending = Some(cmd);
    while let Some(cmd) = pending.take() {
        dispatch(app, cmd, &handle, engine, &tx);
        let ev = rx.recv().await.expect("sync event");
        pending = apply_event(app, ev);
    }
}

fn screen(app: &mut AppState) -> String {
    let mut terminal = Terminal::new(TestBackend::new(160, 30)).unwrap();
    terminal.draw(|f| ui::render(f, app)).unwrap();
    let buf = terminal.backend().buffer();
    let mut out = String::new();
    for y in 0..buf.area.height {
        for x in 0..buf.area.width {
            out.push_str(buf[(x, y)].symbol());
        }
        out.push('\n');
    }
    out
}

// 9) Operator journey through the TUI: create, edit, delete
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tui_create_edit_delete_journey() {
    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut app = AppState::default();
    settle(&mut app, &engine, Command::Refresh).await;
    assert!(app.store.users().is_empty());

    // create
    press(&mut app, KeyCode::Char('n'));
    assert_eq!(app.input_mode, InputMode::Editing);
    assert!(screen(&mut app).contains("Password"));
    type_str(&mut app, NAME);
    press(&mut app, KeyCode::Tab);
    type_str(&mut app, EMAIL);
    press(&mut app, KeyCode::Tab);
    type_str(&mut app, PASSWORD);
    let cmd = press(&mut app, KeyCode::Enter).expect("submit command");
    settle(&mut app, &engine, cmd).await;

    assert_eq!(app.input_mode, InputMode::Normal);
    assert_eq!(app.store.form(), &FormState::default());
    let text = screen(&mut app);
    assert!(text.contains(NAME), "{text}");
    assert!(text.contains(EMAIL), "{text}");
    assert!(!text.contains(PASSWORD));

    // edit
    press(&mut app, KeyCode::Char('e'));
    let id = app.store.form().editing_id().expect("edit mode");
    let text = screen(&mut app);
    assert!(text.contains("Edit user"), "{text}");
    assert!(!text.contains("Password"), "{text}");
    for _ in 0..NAME.chars().count() {
        press(&mut app, KeyCode::Backspace);
    }
    type_str(&mut app, NEW_NAME);
    let cmd = press(&mut app, KeyCode::Enter).expect("update command");
    settle(&mut app, &engine, cmd).await;

    let text = screen(&mut app);
    assert!(text.contains(NEW_NAME), "{text}");
    assert!(!text.contains(NAME), "{text}");
    assert!(text.contains("New user"), "{text}");
    assert_eq!(api.password_of(id).as_deref(), Some(PASSWORD));

    // delete, declined first
    press(&mut app, KeyCode::Char('d'));
    assert!(matches!(app.modal, Some(ModalState::DeleteConfirm { .. })));
    assert_eq!(press(&mut app, KeyCode::Char('n')), None);
    assert_eq!(app.store.users().len(), 1);

    press(&mut app, KeyCode::Char('d'));
    assert!(screen(&mut app).contains("Are you sure you want to delete this user?"));
    let cmd = press(&mut app, KeyCode::Char('y')).expect("delete command");
    settle(&mut app, &engine, cmd).await;

    assert!(app.store.users().is_empty());
    assert!(!screen(&mut app).contains(NEW_NAME));
    assert_eq!(app.in_flight, 0);
}

// 10) A failed save in the TUI keeps the draft and reports the error
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tui_failed_save_keeps_draft() {
    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut app = AppState::default();
    press(&mut app, KeyCode::Char('n'));
    type_str(&mut app, NAME);
    press(&mut app, KeyCode::Tab);
    type_str(&mut app, EMAIL);
    press(&mut app, KeyCode::Tab);
    type_str(&mut app, PASSWORD);
    let draft = app.store.form().clone();

    api.set_failing(true);
    let cmd = press(&mut app, KeyCode::Enter).expect("submit command");
    settle(&mut app, &engine, cmd).await;

    assert_eq!(app.store.form(), &draft);
    assert_eq!(app.input_mode, InputMode::Editing);
    assert!(matches!(&app.status, Some(Status::Error(m)) if m.contains("save failed")));
    assert_eq!(api.calls(), vec!["POST /users"]);
}

// 11) Details modal fetches a single record
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tui_show_details_opens_info_modal() {
    let api = FakeUsersApi::new();
    let engine = engine_for(&api);
    let mut state = DirectoryState::default();
    fill_create_form(&mut state, NAME, EMAIL, PASSWORD);
    engine.submit(&mut state).await.unwrap();

    let mut app = AppState::default();
    settle(&mut app, &engine, Command::Refresh).await;
    let cmd = press(&mut app, KeyCode::Char('i')).expect("inspect command");
    settle(&mut app, &engine, cmd).await;

    match &app.modal {
        Some(ModalState::Info { message }) => {
            assert!(message.contains(NAME));
            assert!(message.contains("created: 2023-11-14T22:13:20"));
        }
        other => panic!("unexpected modal {other:?}"),
    }
}

// 12) Scripted journey against the in-memory service
#[tokio::test]
async fn journey_runs_all_operations_and_cleans_up() {
    let api = FakeUsersApi::new();
    let cfg = JourneyConfig { actors: 3, iterations: 2, ..JourneyConfig::default() };
    let report = journey::run(api.clone(), &cfg, "1700000000000").await;

    assert_eq!(report.samples.len(), 3 * 2 * 4);
    assert!(report.steps().iter().all(|s| s.count == 6 && s.failures == 0));
    assert_eq!(report.failure_rate(), 0.0);
    assert_eq!(report.check_rate(), 1.0);
    assert!(report.violations(&cfg).is_empty());
    assert!(api.list().await.unwrap().is_empty());
}

// 13) Journey against a failing service reports violations
#[tokio::test]
async fn journey_reports_failures() {
    let api = FakeUsersApi::new();
    api.set_failing(true);
    let cfg = JourneyConfig::default();
    let report = journey::run(api, &cfg, "x").await;

    // create and list only; update/delete need a created id
    assert_eq!(report.samples.len(), 2);
    assert_eq!(report.failure_rate(), 1.0);
    assert!(!report.violations(&cfg).is_empty());
}
