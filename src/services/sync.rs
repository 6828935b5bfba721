use chrono::NaiveDate;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::board::{Board, BoardSummary};
use crate::domain::item::{FileRef, Item, PlanningStatus, Priority, ProjectStatus};
use crate::domain::person::{PersonAssignment, Role};
use crate::repository::KvStore;
use crate::services::api_client::{ApiClient, TaskPayload, UpdateForm, UpdateResponse};
use crate::services::cache::TtlCache;
use crate::services::diff::{self, PersonDiff};
use crate::services::error::PlankError;
use crate::services::roles::{self, EditField};

/// Store key holding the board-id list as a URL-encoded JSON array.
pub const BOARD_IDS_KEY: &str = "BoardIDs";
/// Store key registering boards created by this user.
const BOARD_REGISTRY_KEY: &str = "boards";

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

fn board_key(id: u64) -> String {
    format!("board_{}", id)
}

fn task_key(id: u64) -> String {
    format!("task_{}", id)
}

/// Which of the two item lists an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Todo,
    Completed,
}

/// The two attachment slots of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentField {
    Planning,
    Project,
}

impl AttachmentField {
    fn part_name(self) -> &'static str {
        match self {
            AttachmentField::Planning => "planning_file",
            AttachmentField::Project => "project_file",
        }
    }
}

/// A single typed mutation applied to an item in edit mode.
#[derive(Debug, Clone)]
pub enum FieldEdit {
    Name(String),
    PlanningDescription(String),
    PlanningDueDate(NaiveDate),
    PlanningStatus(PlanningStatus),
    Priority(Priority),
    ProjectComment(String),
    ProjectStatus(ProjectStatus),
    ProjectDueDate(NaiveDate),
    AttachFile {
        field: AttachmentField,
        name: String,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Both diffs were empty; no network call was made.
    NoChanges,
    Saved,
}

#[derive(Serialize, Deserialize)]
struct OwnedBoard {
    task_id: u64,
    owner_email: String,
}

/// Owns the board collection, the active board and the single retained
/// edit snapshot, and reconciles them with the remote API and the
/// local cache.
///
/// Methods take `&mut self` and callers are expected to serialize
/// operations: only one edit snapshot exists, so beginning a second
/// edit before saving the first replaces the diff base.
pub struct BoardSync {
    api: ApiClient,
    cache: TtlCache,
    store: Arc<dyn KvStore>,
    identity: String,
    boards: Vec<BoardSummary>,
    current: Option<Board>,
    edit_snapshot: Option<Item>,
}

impl BoardSync {
    pub fn new(
        api: ApiClient,
        cache: TtlCache,
        store: Arc<dyn KvStore>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            api,
            cache,
            store,
            identity: identity.into(),
            boards: Vec::new(),
            current: None,
            edit_snapshot: None,
        }
    }

    pub fn boards(&self) -> &[BoardSummary] {
        &self.boards
    }

    pub fn current(&self) -> Option<&Board> {
        self.current.as_ref()
    }

    /// Whether the viewer's resolved role on the current board may
    /// edit the given field. UI affordance only; the server enforces
    /// the same table.
    pub fn can_edit(&self, field: EditField) -> bool {
        self.current
            .as_ref()
            .map(|b| roles::can_edit(b.viewer_role, field))
            .unwrap_or(false)
    }

    /// Rebuilds the sidebar list from the stored board-id registry.
    /// A board that fails to load is skipped; an expired session is
    /// terminal.
    pub async fn load_boards(&mut self) -> Result<&[BoardSummary], PlankError> {
        let Some(raw) = self.store.get(BOARD_IDS_KEY).await? else {
            self.boards.clear();
            return Ok(&self.boards);
        };

        let decoded = percent_decode_str(&raw).decode_utf8_lossy().into_owned();
        let values: Vec<Value> = serde_json::from_str(&decoded)?;
        let ids: Vec<u64> = values
            .iter()
            .filter_map(|v| {
                v.as_u64()
                    .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            })
            .collect();

        self.boards.clear();
        for id in ids {
            match self.api.get_board(id).await {
                Ok(payload) => self.boards.push(BoardSummary {
                    id: payload.board_id,
                    name: payload.name_board,
                }),
                Err(PlankError::SessionExpired) => return Err(PlankError::SessionExpired),
                Err(err) => {
                    warn!(board_id = id, error = %err, "skipping board that failed to load")
                }
            }
        }
        info!(count = self.boards.len(), "board list loaded");
        Ok(&self.boards)
    }

    /// Creates a board remotely, records it in the local registry and
    /// adopts it as the current board.
    pub async fn create_board(&mut self, name: &str) -> Result<u64, PlankError> {
        let created = self.api.create_board(name).await?;
        info!(board_id = created.task_id, "board created");

        let board = Board {
            id: created.task_id,
            name: created.name_task,
            owner_email: Some(self.identity.clone()),
            todo: Vec::new(),
            completed: Vec::new(),
            viewer_role: Role::Owner,
        };

        self.boards.push(board.summary());
        self.register_owned_board(board.id).await?;
        self.cache.put(&board_key(board.id), &board).await?;
        self.current = Some(board);
        Ok(created.task_id)
    }

    /// Renaming is client-side only.
    pub fn rename_board(&mut self, id: u64, name: &str) {
        if let Some(summary) = self.boards.iter_mut().find(|b| b.id == id) {
            summary.name = name.to_string();
        }
        if let Some(board) = self.current.as_mut().filter(|b| b.id == id) {
            board.name = name.to_string();
        }
    }

    /// Removes the board from the local list; no remote delete, no
    /// tombstone.
    pub fn delete_board(&mut self, id: u64) {
        self.boards.retain(|b| b.id != id);
        if self.current.as_ref().is_some_and(|b| b.id == id) {
            self.current = None;
            self.edit_snapshot = None;
        }
    }

    pub fn search_boards(&self, term: &str) -> Vec<&BoardSummary> {
        let term = term.to_lowercase();
        self.boards
            .iter()
            .filter(|b| b.name.to_lowercase().contains(&term))
            .collect()
    }

    /// Adopts the cached snapshot if one exists, otherwise builds the
    /// board from the task payload (itself cached) and stores it.
    pub async fn load_board(&mut self, id: u64) -> Result<(), PlankError> {
        if let Some(mut board) = self.cache.get::<Board>(&board_key(id)).await? {
            board.clear_edit_flags();
            debug!(board_id = id, "board adopted from cache");
            self.current = Some(board);
            return Ok(());
        }

        let task = self.fetch_task(id).await?;
        let board = self.board_from_task(id, task);
        self.cache.put(&board_key(id), &board).await?;
        info!(board_id = id, role = %board.viewer_role, "board loaded");
        self.current = Some(board);
        Ok(())
    }

    async fn fetch_task(&self, id: u64) -> Result<TaskPayload, PlankError> {
        let key = task_key(id);
        if let Some(task) = self.cache.get::<TaskPayload>(&key).await? {
            debug!(task_id = id, "task served from cache");
            return Ok(task);
        }

        let task = self.api.get_task(id).await?;
        self.cache.put(&key, &task).await?;
        Ok(task)
    }

    fn board_from_task(&self, id: u64, task: TaskPayload) -> Board {
        let viewer_role = roles::resolve_role(&task, &self.identity);
        Board {
            id,
            name: task.name_task.clone(),
            owner_email: task.owner.as_ref().map(|p| p.email.clone()),
            todo: task.todo.into_iter().map(Item::from).collect(),
            completed: task.completed.into_iter().map(Item::from).collect(),
            viewer_role,
        }
    }

    /// Creates an item remotely and appends it to the current TODO
    /// list with the responding user as Owner.
    pub async fn add_item(&mut self, name: &str) -> Result<(), PlankError> {
        if self.current.is_none() {
            return Err(PlankError::NoBoard);
        }

        let created = self.api.create_item(name).await?;
        let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;

        let mut item = Item::new(created.task_id, created.name_task);
        if !created.user_email.is_empty() {
            item.persons
                .push(PersonAssignment::new(created.user_email, Role::Owner));
        }
        board.todo.push(item);
        self.persist_current().await
    }

    /// Takes the pre-edit snapshot of a TODO item and flags it as
    /// being edited. Replaces any previously retained snapshot.
    pub fn begin_edit(&mut self, index: usize) -> Result<(), PlankError> {
        let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;
        let item = board
            .todo
            .get_mut(index)
            .ok_or(PlankError::NoSuchItem { list: "todo", index })?;

        if self.edit_snapshot.is_some() {
            warn!(item_id = item.id, "replacing retained edit snapshot");
        }
        self.edit_snapshot = Some(item.clone());
        item.edit_mode = true;
        Ok(())
    }

    /// Discards the snapshot, reverting the item to its pre-edit state.
    pub fn cancel_edit(&mut self, index: usize) -> Result<(), PlankError> {
        let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;
        let item = board
            .todo
            .get_mut(index)
            .ok_or(PlankError::NoSuchItem { list: "todo", index })?;

        if let Some(snapshot) = self.edit_snapshot.take() {
            *item = snapshot;
        }
        item.edit_mode = false;
        Ok(())
    }

    /// Applies one field mutation to a TODO item, then runs the
    /// promotion check and re-sorts the TODO list by priority.
    pub async fn apply_edit(&mut self, index: usize, edit: FieldEdit) -> Result<(), PlankError> {
        {
            let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;
            let item = board
                .todo
                .get_mut(index)
                .ok_or(PlankError::NoSuchItem { list: "todo", index })?;

            match edit {
                FieldEdit::Name(v) => item.name = v,
                FieldEdit::PlanningDescription(v) => item.planning_description = v,
                FieldEdit::PlanningDueDate(v) => item.planning_due_date = Some(v),
                FieldEdit::PlanningStatus(v) => item.planning_status = v,
                FieldEdit::Priority(v) => item.priority = v,
                FieldEdit::ProjectComment(v) => item.project_comment = v,
                FieldEdit::ProjectStatus(v) => item.project_status = v,
                FieldEdit::ProjectDueDate(v) => item.project_due_date = Some(v),
                FieldEdit::AttachFile { field, name, data } => {
                    let files = match field {
                        AttachmentField::Planning => &mut item.planning_files,
                        AttachmentField::Project => &mut item.project_files,
                    };
                    files.push(FileRef::pending(name, data));
                }
            }

            if item.is_complete() {
                let promoted = board.todo.remove(index);
                info!(item_id = promoted.id, "item promoted to completed");
                board.completed.push(promoted);
            }
            sort_todo(board);
        }
        self.persist_current().await
    }

    /// Diffs the edited item against its snapshot and submits the
    /// changed fields as a partial update. Empty diffs never touch the
    /// network.
    pub async fn save_item(&mut self, index: usize) -> Result<SaveOutcome, PlankError> {
        let (board_id, item_id, form) = {
            let board = self.current.as_ref().ok_or(PlankError::NoBoard)?;
            let item = board
                .todo
                .get(index)
                .ok_or(PlankError::NoSuchItem { list: "todo", index })?;
            let snapshot = self
                .edit_snapshot
                .as_ref()
                .ok_or(PlankError::NoEditInProgress { item_id: item.id })?;

            let fields = diff::changed_fields(item, snapshot)?;
            let persons = diff::changed_persons(&item.persons, &snapshot.persons);

            if fields.is_empty() && persons.is_empty() {
                debug!(item_id = item.id, "no changes detected, skipping save");
                return Ok(SaveOutcome::NoChanges);
            }

            (board.id, item.id, build_update_form(item, &fields, &persons))
        };

        let response = self.api.update_item(board_id, item_id, form).await?;

        let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;
        let item = board
            .todo
            .get_mut(index)
            .ok_or(PlankError::NoSuchItem { list: "todo", index })?;
        merge_update(item, &response);
        item.edit_mode = false;
        self.edit_snapshot = None;
        info!(item_id, board_id, "item saved");

        self.persist_current().await?;
        Ok(SaveOutcome::Saved)
    }

    /// Immediate upload path: one request per file against the board's
    /// task endpoint, merging each response into the item. A
    /// duplicate-file rejection skips that file and continues; every
    /// other failure is terminal. Returns the skipped file names.
    pub async fn upload_files(
        &mut self,
        index: usize,
        field: AttachmentField,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<Vec<String>, PlankError> {
        let board_id = self.current.as_ref().ok_or(PlankError::NoBoard)?.id;
        let mut skipped = Vec::new();

        for (name, data) in files {
            match self
                .api
                .upload_file(board_id, field.part_name(), &name, data)
                .await
            {
                Ok(response) => {
                    let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;
                    let item = board
                        .todo
                        .get_mut(index)
                        .ok_or(PlankError::NoSuchItem { list: "todo", index })?;
                    merge_update(item, &response);
                }
                Err(PlankError::FileAlreadyExists) => {
                    warn!(file = %name, "file already exists on the server, skipped");
                    skipped.push(name);
                }
                Err(err) => return Err(err),
            }
        }

        self.persist_current().await?;
        Ok(skipped)
    }

    /// Manual demotion: COMPLETED -> TODO with both statuses reset.
    pub async fn move_to_todo(&mut self, index: usize) -> Result<(), PlankError> {
        {
            let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;
            if index >= board.completed.len() {
                return Err(PlankError::NoSuchItem {
                    list: "completed",
                    index,
                });
            }

            let mut item = board.completed.remove(index);
            item.reset_statuses();
            info!(item_id = item.id, "item moved back to todo");
            board.todo.push(item);
            sort_todo(board);
        }
        self.persist_current().await
    }

    /// Adds a person to a TODO item. Owner is implicit from board
    /// ownership and is never added here; at most one Manager and one
    /// Employee may exist per item.
    pub fn add_person(
        &mut self,
        index: usize,
        email: &str,
        role: Role,
        display_role: Option<String>,
    ) -> Result<(), PlankError> {
        if !matches!(role, Role::Manager | Role::Employee) {
            return Err(PlankError::RoleNotAssignable { role });
        }

        let email_re = regex::Regex::new(EMAIL_PATTERN).unwrap();
        if !email_re.is_match(email) {
            return Err(PlankError::InvalidEmail {
                email: email.to_string(),
            });
        }

        let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;
        let item = board
            .todo
            .get_mut(index)
            .ok_or(PlankError::NoSuchItem { list: "todo", index })?;

        if item.persons.iter().any(|p| p.role == role) {
            return Err(PlankError::RoleTaken { role });
        }

        item.persons.push(PersonAssignment {
            email: email.to_string(),
            role,
            display_role,
        });
        Ok(())
    }

    pub fn remove_person(&mut self, index: usize, person_index: usize) -> Result<(), PlankError> {
        let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;
        let item = board
            .todo
            .get_mut(index)
            .ok_or(PlankError::NoSuchItem { list: "todo", index })?;

        if person_index >= item.persons.len() {
            return Err(PlankError::NoSuchItem {
                list: "persons",
                index: person_index,
            });
        }
        item.persons.remove(person_index);
        Ok(())
    }

    /// Local removal, no tombstone.
    pub async fn remove_item(&mut self, list: ListKind, index: usize) -> Result<(), PlankError> {
        {
            let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;
            let items = match list {
                ListKind::Todo => &mut board.todo,
                ListKind::Completed => &mut board.completed,
            };
            if index >= items.len() {
                return Err(PlankError::NoSuchItem {
                    list: match list {
                        ListKind::Todo => "todo",
                        ListKind::Completed => "completed",
                    },
                    index,
                });
            }
            items.remove(index);
        }
        self.persist_current().await
    }

    /// Drops one attachment reference from an item; local only.
    pub fn remove_file(
        &mut self,
        index: usize,
        field: AttachmentField,
        file_index: usize,
    ) -> Result<(), PlankError> {
        let board = self.current.as_mut().ok_or(PlankError::NoBoard)?;
        let item = board
            .todo
            .get_mut(index)
            .ok_or(PlankError::NoSuchItem { list: "todo", index })?;
        let files = match field {
            AttachmentField::Planning => &mut item.planning_files,
            AttachmentField::Project => &mut item.project_files,
        };

        if file_index >= files.len() {
            return Err(PlankError::NoSuchItem {
                list: "files",
                index: file_index,
            });
        }
        files.remove(file_index);
        Ok(())
    }

    /// Writes the current board snapshot to the cache with all edit
    /// flags cleared.
    pub async fn persist_current(&self) -> Result<(), PlankError> {
        if let Some(board) = &self.current {
            let mut snapshot = board.clone();
            snapshot.clear_edit_flags();
            self.cache.put(&board_key(board.id), &snapshot).await?;
        }
        Ok(())
    }

    async fn register_owned_board(&self, id: u64) -> Result<(), PlankError> {
        let mut owned: Vec<OwnedBoard> = match self.store.get(BOARD_REGISTRY_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => Vec::new(),
        };
        owned.push(OwnedBoard {
            task_id: id,
            owner_email: self.identity.clone(),
        });
        self.store
            .put(BOARD_REGISTRY_KEY, &serde_json::to_string(&owned)?)
            .await?;
        Ok(())
    }
}

/// Stable sort under the fixed order High=0, Medium=1, Low=2; ties keep
/// their prior relative order.
fn sort_todo(board: &mut Board) {
    board.todo.sort_by_key(|i| i.priority.sort_rank());
}

/// Changed, non-empty scalar fields as text parts; pending attachment
/// bytes as binary parts; at most one manager and one employee email
/// from the added persons.
fn build_update_form(
    item: &Item,
    fields: &BTreeMap<String, Value>,
    persons: &PersonDiff,
) -> UpdateForm {
    let mut form = UpdateForm::default();

    for (key, value) in fields {
        match key.as_str() {
            "planning_file" => push_pending_files(&mut form, "planning_file", &item.planning_files),
            "project_file" => push_pending_files(&mut form, "project_file", &item.project_files),
            _ => {
                let text = match value {
                    Value::String(s) if s.is_empty() => continue,
                    Value::String(s) => s.clone(),
                    Value::Null => continue,
                    other => other.to_string(),
                };
                form.fields.push((key.clone(), text));
            }
        }
    }

    for person in &persons.added {
        match person.role {
            Role::Manager if !form.has_field("manager") => {
                form.fields.push(("manager".to_string(), person.email.clone()));
            }
            Role::Employee if !form.has_field("employee") => {
                form.fields
                    .push(("employee".to_string(), person.email.clone()));
            }
            _ => {}
        }
    }

    form
}

fn push_pending_files(form: &mut UpdateForm, part_name: &'static str, files: &[FileRef]) {
    for file in files {
        if let Some(data) = &file.data {
            form.files.push((part_name, file.name.clone(), data.clone()));
        }
    }
}

/// Merges a partial-update response back into the item. Attachment
/// fields become the single stored reference; manager/employee
/// update-or-insert the person entry of that role. The server emits
/// the literal "Undone" for scalar fields it did not set, so a
/// returned "Undone" never overwrites the local value - even when it
/// is a real demotion arriving from elsewhere.
fn merge_update(item: &mut Item, response: &UpdateResponse) {
    if let Some(file) = &response.planning_file {
        if !file.file_name.is_empty() {
            item.planning_files = vec![FileRef::stored(&file.file_name, &file.file_url)];
        }
    }
    if let Some(file) = &response.project_file {
        if !file.file_name.is_empty() {
            item.project_files = vec![FileRef::stored(&file.file_name, &file.file_url)];
        }
    }

    if let Some(person) = &response.manager {
        if !person.email.is_empty() {
            upsert_person(item, &person.email, Role::Manager);
        }
    }
    if let Some(person) = &response.employee {
        if !person.email.is_empty() {
            upsert_person(item, &person.email, Role::Employee);
        }
    }

    if let Some(v) = returned(&response.name_task) {
        item.name = v.to_string();
    }
    if let Some(v) = returned(&response.planning_description) {
        item.planning_description = v.to_string();
    }
    if let Some(v) = returned(&response.project_comment) {
        item.project_comment = v.to_string();
    }
    if let Some(v) = returned(&response.planning_status) {
        if let Ok(status) = v.parse() {
            item.planning_status = status;
        }
    }
    if let Some(v) = returned(&response.project_status) {
        if let Ok(status) = v.parse() {
            item.project_status = status;
        }
    }
    if let Some(v) = returned(&response.priority) {
        if let Ok(priority) = v.parse() {
            item.priority = priority;
        }
    }
    if let Some(v) = returned(&response.planning_due_date) {
        if let Ok(date) = NaiveDate::parse_from_str(v, "%Y-%m-%d") {
            item.planning_due_date = Some(date);
        }
    }
    if let Some(v) = returned(&response.project_due_date) {
        if let Ok(date) = NaiveDate::parse_from_str(v, "%Y-%m-%d") {
            item.project_due_date = Some(date);
        }
    }
}

/// A scalar counts as returned only when present, non-empty and not
/// the "Undone" placeholder.
fn returned(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .filter(|v| !v.is_empty() && *v != "Undone")
}

fn upsert_person(item: &mut Item, email: &str, role: Role) {
    match item.persons.iter_mut().find(|p| p.role == role) {
        Some(person) => {
            person.email = email.to_string();
            person.display_role = None;
        }
        None => item.persons.push(PersonAssignment::new(email, role)),
    }
}
