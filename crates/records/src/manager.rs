//! Schema-driven record management.
//!
//! A [`RecordManager`] holds the transient state of one listing view: the
//! fetched rows, the search term, at most one create form, at most one edit
//! session and at most one pending delete confirmation. A front end renders
//! that state and forwards user actions. Every mutation goes to the backend
//! and the listing is re-fetched once the backend has acknowledged it; rows
//! are never patched locally.

use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::Record;
use crate::cache::QueryCache;
use crate::errors::ServiceError;
use crate::models::{Entity, EntityKind};
use crate::service::RecordService;

/// Shown for empty cells.
pub const EMPTY_CELL: &str = "-";

/// Columns the backend owns; never part of a draft or patch.
const MANAGED_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Custom cell renderer for the listing.
pub type Renderer = Arc<dyn Fn(&Value) -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    /// Stored in the form as-is when chosen.
    pub value: Value,
    pub label: String,
}

impl SelectOption {
    /// Creates an option from a stored value and its label.
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// The string a dropdown submits for this option.
    pub fn key(&self) -> String {
        text_of(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputKind {
    Text,
    TextArea,
    Number,
    Boolean,
    Email,
    Url,
    Select(Vec<SelectOption>),
}

/// One column of the listing and, unless hidden, one field of the forms.
#[derive(Clone)]
pub struct Column {
    pub key: String,
    pub label: String,
    pub input: InputKind,
    pub render: Option<Renderer>,
    /// Listed but never editable (the id column).
    pub hidden: bool,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("input", &self.input)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}

impl Column {
    /// Creates a visible text column.
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            input: InputKind::Text,
            render: None,
            hidden: false,
        }
    }

    /// Sets the form input used for this column.
    pub fn input(mut self, input: InputKind) -> Self {
        self.input = input;
        self
    }

    /// Sets a custom cell renderer, applied to non-null values.
    pub fn render(mut self, render: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        self.render = Some(Arc::new(render));
        self
    }

    /// Keeps the column in the listing but out of the forms.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Cell text: the custom renderer if any, otherwise the raw value.
    pub fn display(&self, value: Option<&Value>) -> String {
        match (&self.render, value) {
            (Some(render), Some(v)) if !v.is_null() => render(v),
            _ => display_value(value),
        }
    }

    fn coerce_text(&self, raw: &str) -> Result<Value, FormError> {
        match &self.input {
            InputKind::Number => parse_number(&self.key, raw),
            InputKind::Boolean => Err(FormError::WrongKind {
                field: self.key.clone(),
                expected: "text",
            }),
            InputKind::Select(_) => Err(FormError::WrongKind {
                field: self.key.clone(),
                expected: "text",
            }),
            InputKind::Text | InputKind::TextArea | InputKind::Email | InputKind::Url => {
                Ok(Value::String(raw.to_string()))
            }
        }
    }
}

/// Empty input means unset, not zero.
fn parse_number(field: &str, raw: &str) -> Result<Value, FormError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(Value::from(n));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| FormError::NotNumeric {
            field: field.to_string(),
            input: raw.to_string(),
        })
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Verbatim cell text, or [`EMPTY_CELL`] for null and empty strings.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => EMPTY_CELL.to_string(),
        Some(Value::String(s)) if s.is_empty() => EMPTY_CELL.to_string(),
        Some(v) => text_of(v),
    }
}

fn search_text(value: &Value) -> Option<String> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Some(text_of(value)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Rows whose searchable fields contain `term`, ignoring case.
///
/// An empty term keeps every row, in order.
pub fn filter_records<'a>(rows: &'a [Record], fields: &[String], term: &str) -> Vec<&'a Record> {
    if term.is_empty() {
        return rows.iter().collect();
    }
    let needle = term.to_lowercase();
    rows.iter()
        .filter(|row| {
            fields.iter().any(|field| {
                row.get(field)
                    .and_then(search_text)
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
        })
        .collect()
}

fn record_id(row: &Record) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}

fn to_record<E: Entity>(row: &E) -> Result<Record, ServiceError> {
    match serde_json::to_value(row)? {
        Value::Object(map) => Ok(map),
        other => Err(ServiceError::InvalidInput(format!(
            "{} row is not an object: {other}",
            E::KIND
        ))),
    }
}

/// Form values minus hidden columns and backend-managed columns.
fn writable_fields(columns: &[Column], values: &Record) -> Record {
    values
        .iter()
        .filter(|(key, _)| {
            !MANAGED_COLUMNS.contains(&key.as_str())
                && !columns.iter().any(|c| c.hidden && c.key == **key)
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn build_draft<E: Entity>(columns: &[Column], values: &Record) -> Result<E::Draft, ServiceError> {
    serde_json::from_value(Value::Object(writable_fields(columns, values)))
        .map_err(|e| ServiceError::InvalidInput(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListingState {
    Loading,
    Ready(Vec<Record>),
    Failed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("form is not open")]
    NotOpen,
    #[error("unknown field {0}")]
    UnknownField(String),
    #[error("{0} is not editable")]
    NotEditable(String),
    #[error("{field} expects a number, got {input:?}")]
    NotNumeric { field: String, input: String },
    #[error("{field} has no option {key:?}")]
    UnknownOption { field: String, key: String },
    #[error("{field} does not take {expected} input")]
    WrongKind { field: String, expected: &'static str },
    #[error("no row with id {0} in the listing")]
    UnknownRow(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormTarget {
    Create,
    Edit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    values: Record,
    busy: bool,
}

impl Form {
    fn new(values: Record) -> Self {
        Self {
            values,
            busy: false,
        }
    }

    /// Current field values.
    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// True while a submit is in flight; the submit control is disabled.
    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

#[derive(Debug, Clone, PartialEq)]
struct EditSession {
    id: i64,
    form: Form,
}

/// How a form field should be drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget<'a> {
    Input {
        kind: &'a InputKind,
        value: String,
        placeholder: String,
    },
    Checkbox {
        label: &'a str,
        checked: bool,
    },
    Dropdown {
        options: &'a [SelectOption],
        selected: Option<usize>,
        placeholder: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldView<'a> {
    pub key: &'a str,
    pub label: &'a str,
    pub widget: Widget<'a>,
}

fn widget_for<'a>(column: &'a Column, value: Option<&Value>) -> Widget<'a> {
    let lower = column.label.to_lowercase();
    match &column.input {
        InputKind::Boolean => Widget::Checkbox {
            label: &column.label,
            checked: value.and_then(Value::as_bool).unwrap_or(false),
        },
        InputKind::Select(options) => {
            let selected = value.filter(|v| !v.is_null()).and_then(|v| {
                let key = text_of(v);
                options.iter().position(|o| o.value == *v || o.key() == key)
            });
            Widget::Dropdown {
                options,
                selected,
                placeholder: format!("Select {lower}"),
            }
        }
        kind => Widget::Input {
            kind,
            value: value.map(text_of).unwrap_or_default(),
            placeholder: format!("Enter {lower}"),
        },
    }
}

/// Result of a submit or delete confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The backend accepted the mutation.
    Applied(T),
    /// The backend (or draft validation) refused; the message was notified.
    Rejected(String),
    /// Nothing to submit: no open form, a submit already in flight, or no pending delete.
    Skipped,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }
}

/// Static description of one listing view.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub title: String,
    pub description: String,
    pub columns: Vec<Column>,
    /// Initial values of the create form.
    pub defaults: Record,
    pub search_fields: Vec<String>,
}

impl ManagerConfig {
    /// Creates a config with no columns, defaults or search fields.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            columns: Vec::new(),
            defaults: Record::new(),
            search_fields: Vec::new(),
        }
    }

    /// Appends a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the initial values of the create form.
    pub fn defaults(mut self, defaults: Record) -> Self {
        self.defaults = defaults;
        self
    }

    /// Fields matched by the search box. None disables search.
    pub fn search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Generic CRUD orchestrator for one entity kind.
pub struct RecordManager<E: Entity> {
    config: ManagerConfig,
    service: Arc<dyn RecordService<E>>,
    cache: Arc<QueryCache>,
    listing: ListingState,
    search: String,
    create: Option<Form>,
    edit: Option<EditSession>,
    pending_delete: Option<i64>,
    notifications: Vec<Notification>,
}

impl<E: Entity> RecordManager<E> {
    /// Creates a manager in the loading state; call [`RecordManager::load`] next.
    pub fn new(
        config: ManagerConfig,
        service: Arc<dyn RecordService<E>>,
        cache: Arc<QueryCache>,
    ) -> Self {
        Self {
            config,
            service,
            cache,
            listing: ListingState::Loading,
            search: String::new(),
            create: None,
            edit: None,
            pending_delete: None,
            notifications: Vec::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        E::KIND
    }

    /// Plural display name, e.g. `Posts`.
    pub fn title(&self) -> &str {
        &self.config.title
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn columns(&self) -> &[Column] {
        &self.config.columns
    }

    fn singular(&self) -> &str {
        let title = self.config.title.as_str();
        title.strip_suffix('s').unwrap_or(title)
    }

    // Listing

    /// Fetches the listing. Cached rows are shown while the fetch is in flight.
    pub async fn load(&mut self) {
        if let Some(rows) = self.cache.get(E::KIND) {
            self.listing = ListingState::Ready(rows);
        }
        self.fetch().await;
    }

    /// Full reload after a failed fetch.
    pub async fn retry(&mut self) {
        self.cache.invalidate(E::KIND);
        self.fetch().await;
    }

    async fn fetch(&mut self) {
        if !matches!(self.listing, ListingState::Ready(_)) {
            self.listing = ListingState::Loading;
        }
        let rows = match self.service.get_all().await {
            Ok(rows) => rows.iter().map(to_record).collect::<Result<Vec<_>, _>>(),
            Err(e) => Err(e),
        };
        match rows {
            Ok(rows) => {
                self.cache.put(E::KIND, rows.clone());
                self.listing = ListingState::Ready(rows);
            }
            Err(e) => {
                warn!("Error loading {}: {e}", E::KIND);
                self.listing = ListingState::Failed(e.to_string());
            }
        }
    }

    /// Current listing state.
    pub fn listing(&self) -> &ListingState {
        &self.listing
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.listing, ListingState::Loading)
    }

    /// Error text for the failed-listing state, if the last fetch failed.
    pub fn load_error(&self) -> Option<String> {
        match &self.listing {
            ListingState::Failed(msg) => Some(format!(
                "Error loading {}: {msg}",
                self.config.title.to_lowercase()
            )),
            _ => None,
        }
    }

    fn loaded(&self) -> &[Record] {
        match &self.listing {
            ListingState::Ready(rows) => rows,
            ListingState::Loading | ListingState::Failed(_) => &[],
        }
    }

    fn find_row(&self, id: i64) -> Option<&Record> {
        self.loaded().iter().find(|row| record_id(row) == Some(id))
    }

    /// Replaces the search term. Filtering is local; nothing is fetched.
    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    pub fn is_searchable(&self) -> bool {
        !self.config.search_fields.is_empty()
    }

    pub fn search_placeholder(&self) -> String {
        format!("Search {}...", self.config.title.to_lowercase())
    }

    /// Loaded rows after the search filter.
    pub fn visible(&self) -> Vec<&Record> {
        filter_records(self.loaded(), &self.config.search_fields, &self.search)
    }

    /// Column labels in display order.
    pub fn headers(&self) -> Vec<&str> {
        self.config.columns.iter().map(|c| c.label.as_str()).collect()
    }

    /// Rendered cells of the visible rows.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.visible()
            .into_iter()
            .map(|row| {
                self.config
                    .columns
                    .iter()
                    .map(|c| c.display(row.get(&c.key)))
                    .collect()
            })
            .collect()
    }

    /// Title with the number of visible rows, e.g. `Posts (3)`.
    pub fn title_count(&self) -> String {
        format!("{} ({})", self.config.title, self.visible().len())
    }

    pub fn empty_message(&self) -> String {
        format!("No {} found.", self.config.title.to_lowercase())
    }

    // Forms

    /// The create form or edit form, if open.
    pub fn form(&self, target: FormTarget) -> Option<&Form> {
        match target {
            FormTarget::Create => self.create.as_ref(),
            FormTarget::Edit => self.edit.as_ref().map(|s| &s.form),
        }
    }

    fn form_mut(&mut self, target: FormTarget) -> Result<&mut Form, FormError> {
        match target {
            FormTarget::Create => self.create.as_mut(),
            FormTarget::Edit => self.edit.as_mut().map(|s| &mut s.form),
        }
        .ok_or(FormError::NotOpen)
    }

    fn editable_column(&self, key: &str) -> Result<&Column, FormError> {
        let column = self
            .config
            .columns
            .iter()
            .find(|c| c.key == key)
            .ok_or_else(|| FormError::UnknownField(key.to_string()))?;
        if column.hidden {
            return Err(FormError::NotEditable(key.to_string()));
        }
        Ok(column)
    }

    /// Fields of an open form, hidden columns excluded.
    pub fn form_fields(&self, target: FormTarget) -> Vec<FieldView<'_>> {
        let Some(form) = self.form(target) else {
            return Vec::new();
        };
        self.config
            .columns
            .iter()
            .filter(|c| !c.hidden)
            .map(|c| FieldView {
                key: &c.key,
                label: &c.label,
                widget: widget_for(c, form.get(&c.key)),
            })
            .collect()
    }

    /// Text, multi-line, email, URL and numeric input.
    pub fn set_text(&mut self, target: FormTarget, key: &str, raw: &str) -> Result<(), FormError> {
        let value = self.editable_column(key)?.coerce_text(raw)?;
        self.form_mut(target)?.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Sets a boolean field.
    pub fn set_checked(
        &mut self,
        target: FormTarget,
        key: &str,
        checked: bool,
    ) -> Result<(), FormError> {
        let column = self.editable_column(key)?;
        if !matches!(column.input, InputKind::Boolean) {
            return Err(FormError::WrongKind {
                field: key.to_string(),
                expected: "boolean",
            });
        }
        self.form_mut(target)?
            .values
            .insert(key.to_string(), Value::Bool(checked));
        Ok(())
    }

    /// Picks a dropdown option by its key and stores the option's raw value.
    pub fn choose(&mut self, target: FormTarget, key: &str, option_key: &str) -> Result<(), FormError> {
        let column = self.editable_column(key)?;
        let InputKind::Select(options) = &column.input else {
            return Err(FormError::WrongKind {
                field: key.to_string(),
                expected: "select",
            });
        };
        let value = options
            .iter()
            .find(|o| o.key() == option_key)
            .map(|o| o.value.clone())
            .ok_or_else(|| FormError::UnknownOption {
                field: key.to_string(),
                key: option_key.to_string(),
            })?;
        self.form_mut(target)?.values.insert(key.to_string(), value);
        Ok(())
    }

    // Create

    pub fn create_heading(&self) -> String {
        format!("Add {}", self.singular())
    }

    pub fn create_prompt(&self) -> String {
        format!(
            "Fill in the details to create a new {}.",
            self.singular().to_lowercase()
        )
    }

    /// Opens the create form with the default values; keeps an already open one.
    pub fn open_create(&mut self) {
        if self.create.is_none() {
            self.create = Some(Form::new(self.config.defaults.clone()));
        }
    }

    /// Closes the create form and discards its values.
    pub fn cancel_create(&mut self) {
        self.create = None;
    }

    pub fn create_form(&self) -> Option<&Form> {
        self.create.as_ref()
    }

    /// Sends the create form to the backend and re-fetches on success.
    ///
    /// A failure keeps the form open with its values.
    pub async fn submit_create(&mut self) -> Outcome<E> {
        let draft = {
            let Some(form) = self.create.as_mut() else {
                return Outcome::Skipped;
            };
            if form.busy {
                return Outcome::Skipped;
            }
            let draft = build_draft::<E>(&self.config.columns, &form.values);
            form.busy = draft.is_ok();
            draft
        };
        let draft = match draft {
            Ok(draft) => draft,
            Err(e) => return self.fail("create", e),
        };

        let result = self.service.create(&draft).await;
        if let Some(form) = self.create.as_mut() {
            form.busy = false;
        }
        match result {
            Ok(row) => {
                self.create = None;
                self.succeed("created").await;
                Outcome::Applied(row)
            }
            Err(e) => self.fail("create", e),
        }
    }

    // Edit

    pub fn edit_prompt(&self) -> String {
        format!(
            "Update the details of this {}.",
            self.singular().to_lowercase()
        )
    }

    /// Opens the edit form for one listed row, replacing any other edit session.
    pub fn begin_edit(&mut self, id: i64) -> Result<(), FormError> {
        let row = self.find_row(id).cloned().ok_or(FormError::UnknownRow(id))?;
        self.edit = Some(EditSession {
            id,
            form: Form::new(row),
        });
        Ok(())
    }

    /// Id of the row being edited.
    pub fn editing_id(&self) -> Option<i64> {
        self.edit.as_ref().map(|s| s.id)
    }

    pub fn edit_form(&self) -> Option<&Form> {
        self.form(FormTarget::Edit)
    }

    /// Ends the edit session without saving.
    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    /// Sends the edited fields of the open session and re-fetches on success.
    pub async fn submit_edit(&mut self) -> Outcome<E> {
        let (id, patch) = {
            let Some(session) = self.edit.as_mut() else {
                return Outcome::Skipped;
            };
            if session.form.busy {
                return Outcome::Skipped;
            }
            session.form.busy = true;
            (
                session.id,
                writable_fields(&self.config.columns, &session.form.values),
            )
        };

        let result = self.service.update(id, patch).await;
        if let Some(session) = self.edit.as_mut() {
            session.form.busy = false;
        }
        match result {
            Ok(row) => {
                self.edit = None;
                self.succeed("updated").await;
                Outcome::Applied(row)
            }
            Err(e) => self.fail("update", e),
        }
    }

    // Delete

    pub fn delete_heading(&self) -> String {
        format!("Delete {}", self.singular())
    }

    /// Asks for confirmation before deleting a listed row.
    pub fn request_delete(&mut self, id: i64) -> Result<(), FormError> {
        if self.find_row(id).is_none() {
            return Err(FormError::UnknownRow(id));
        }
        self.pending_delete = Some(id);
        Ok(())
    }

    pub fn pending_delete(&self) -> Option<i64> {
        self.pending_delete
    }

    pub fn delete_prompt(&self) -> Option<String> {
        self.pending_delete.map(|_| {
            format!(
                "Are you sure you want to delete this {}? This action cannot be undone.",
                self.singular().to_lowercase()
            )
        })
    }

    /// Dismisses the confirmation; nothing is deleted.
    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Deletes the pending row. Its edit session, if any, is closed.
    pub async fn confirm_delete(&mut self) -> Outcome<i64> {
        let Some(id) = self.pending_delete.take() else {
            return Outcome::Skipped;
        };
        match self.service.delete(id).await {
            Ok(()) => {
                if self.editing_id() == Some(id) {
                    self.edit = None;
                }
                self.succeed("deleted").await;
                Outcome::Applied(id)
            }
            Err(e) => self.fail("delete", e),
        }
    }

    // Notifications

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Drains pending notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    async fn succeed(&mut self, done: &str) {
        let message = format!("{} {done} successfully!", self.config.title);
        info!("{message}");
        self.notifications.push(Notification {
            level: Level::Success,
            message,
        });
        self.cache.invalidate(E::KIND);
        self.fetch().await;
    }

    fn fail<T>(&mut self, action: &str, err: ServiceError) -> Outcome<T> {
        let message = format!(
            "Failed to {action} {}: {err}",
            self.config.title.to_lowercase()
        );
        warn!("{message}");
        self.notifications.push(Notification {
            level: Level::Error,
            message,
        });
        Outcome::Rejected(err.to_string())
    }
}
