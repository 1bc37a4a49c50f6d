//! External collaborators
//!
//! The resolvers never touch storage directly. Records, language keys and
//! generated script functions come through the traits below, which a host
//! application implements over its own database. In-memory implementations
//! back the CLI and the tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::{EscapeSettings, ExportConfig};
use crate::error::ServiceError;
use crate::model::{Dialog, FlexFieldObject, LanguageKey, ObjectType, Script, ScriptFunction};
use crate::parser::trim_blank_lines;
use crate::template::{TemplateProvider, TemplateRegistry};

/// Read-only access to domain records
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn object(&self, id: &str) -> Result<FlexFieldObject, ServiceError>;

    /// Dialog attached to an object, if it has one
    async fn dialog_for_object(&self, object_id: &str) -> Result<Option<Dialog>, ServiceError>;
}

/// Field part of a language-key request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyField {
    pub id: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest {
    pub owner_id: String,
    pub owner_name: String,
    pub object_type: ObjectType,
    /// `None` requests the key of the owner's name
    pub field: Option<KeyField>,
}

impl KeyRequest {
    pub fn for_name(owner_id: impl Into<String>, owner_name: impl Into<String>, object_type: ObjectType) -> Self {
        Self {
            owner_id: owner_id.into(),
            owner_name: owner_name.into(),
            object_type,
            field: None,
        }
    }

    pub fn with_field(mut self, id: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.field = Some(KeyField {
            id: id.into(),
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// Creates persistent localization keys on first reference
#[async_trait]
pub trait LanguageKeyGenerator: Send + Sync {
    async fn get_or_create_key(&self, request: &KeyRequest) -> Result<String, ServiceError>;
}

/// Turns a source script into one or more named functions
///
/// The first returned function is the script's primary function.
#[async_trait]
pub trait ScriptFunctionGenerator: Send + Sync {
    async fn generate(&self, owner_name: &str, script: &Script) -> Result<Vec<ScriptFunction>, ServiceError>;
}

/// Make a string usable as an identifier in generated code
pub fn to_identifier(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Project data file layout read by the CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default)]
    pub objects: Vec<FlexFieldObject>,
    #[serde(default)]
    pub dialogs: Vec<Dialog>,
}

/// Record store over an in-memory project
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    objects: HashMap<String, FlexFieldObject>,
    /// Keyed by owning object id
    dialogs: HashMap<String, Dialog>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_project(project: ProjectData) -> Self {
        let mut store = Self::new();
        for object in project.objects {
            store.insert_object(object);
        }
        for dialog in project.dialogs {
            store.insert_dialog(dialog);
        }
        store
    }

    pub fn from_json(json: &str) -> Result<Self, ServiceError> {
        let project: ProjectData = serde_json::from_str(json)?;
        Ok(Self::from_project(project))
    }

    pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn insert_object(&mut self, object: FlexFieldObject) {
        self.objects.insert(object.id.clone(), object);
    }

    pub fn insert_dialog(&mut self, dialog: Dialog) {
        self.dialogs.insert(dialog.object_id.clone(), dialog);
    }

    pub fn with_object(mut self, object: FlexFieldObject) -> Self {
        self.insert_object(object);
        self
    }

    pub fn with_dialog(mut self, dialog: Dialog) -> Self {
        self.insert_dialog(dialog);
        self
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn object(&self, id: &str) -> Result<FlexFieldObject, ServiceError> {
        self.objects
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound {
                what: "object",
                id: id.to_string(),
            })
    }

    async fn dialog_for_object(&self, object_id: &str) -> Result<Option<Dialog>, ServiceError> {
        Ok(self.dialogs.get(object_id).cloned())
    }
}

#[derive(Debug, Default)]
struct KeyTable {
    /// Request identity -> issued key
    by_owner: HashMap<(String, Option<String>), String>,
    /// Issued key -> value
    values: HashMap<String, String>,
}

/// Language-key generator keeping its keys in memory
///
/// Keys read `{Type}_{Owner}_{Field}`; a numeric suffix is appended when two
/// different owners would otherwise share a key.
#[derive(Debug, Default)]
pub struct InMemoryLanguageKeys {
    table: Mutex<KeyTable>,
}

impl InMemoryLanguageKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// All issued keys, sorted by key
    pub async fn keys(&self) -> Vec<LanguageKey> {
        let table = self.table.lock().await;
        let mut keys: Vec<LanguageKey> = table
            .values
            .iter()
            .map(|(key, value)| LanguageKey {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        keys
    }
}

#[async_trait]
impl LanguageKeyGenerator for InMemoryLanguageKeys {
    async fn get_or_create_key(&self, request: &KeyRequest) -> Result<String, ServiceError> {
        let identity = (
            request.owner_id.clone(),
            request.field.as_ref().map(|f| f.id.clone()),
        );
        let (field_name, value) = match &request.field {
            Some(field) => (field.name.as_str(), field.value.as_str()),
            None => ("Name", request.owner_name.as_str()),
        };

        let mut table = self.table.lock().await;
        if let Some(key) = table.by_owner.get(&identity) {
            let key = key.clone();
            table.values.insert(key.clone(), value.to_string());
            return Ok(key);
        }

        let base = format!(
            "{}_{}_{}",
            request.object_type,
            to_identifier(&request.owner_name),
            to_identifier(field_name)
        );
        let mut key = base.clone();
        let mut n = 2;
        while table.values.contains_key(&key) {
            key = format!("{}_{}", base, n);
            n += 1;
        }

        table.by_owner.insert(identity, key.clone());
        table.values.insert(key.clone(), value.to_string());
        Ok(key)
    }
}

/// Splits scripts into functions at `@function <Name>` lines
///
/// Code before the first marker forms the primary function
/// `{Owner}_{Script}`; every marker starts `{Owner}_{Script}_{Name}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionScriptGenerator;

const FUNCTION_MARKER: &str = "@function ";

#[async_trait]
impl ScriptFunctionGenerator for SectionScriptGenerator {
    async fn generate(&self, owner_name: &str, script: &Script) -> Result<Vec<ScriptFunction>, ServiceError> {
        let base = format!("{}_{}", to_identifier(owner_name), to_identifier(&script.name));
        let mut functions = vec![ScriptFunction {
            name: base.clone(),
            code: String::new(),
            parent_preview: script.name.clone(),
        }];

        for line in script.code.lines() {
            if let Some(name) = line.trim_start().strip_prefix(FUNCTION_MARKER) {
                functions.push(ScriptFunction {
                    name: format!("{}_{}", base, to_identifier(name)),
                    code: String::new(),
                    parent_preview: script.name.clone(),
                });
                continue;
            }
            if let Some(current) = functions.last_mut() {
                current.code.push_str(line);
                current.code.push('\n');
            }
        }

        for function in &mut functions {
            function.code = trim_blank_lines(&function.code);
        }
        Ok(functions)
    }
}

/// Collaborators and settings shared by every render of an engine
#[derive(Clone)]
pub struct Services {
    pub templates: Arc<dyn TemplateProvider>,
    pub records: Arc<dyn RecordStore>,
    pub language_keys: Arc<dyn LanguageKeyGenerator>,
    pub scripts: Arc<dyn ScriptFunctionGenerator>,
    pub project_id: String,
    pub escape: EscapeSettings,
}

impl Services {
    pub fn new(templates: Arc<dyn TemplateProvider>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            templates,
            records,
            language_keys: Arc::new(InMemoryLanguageKeys::new()),
            scripts: Arc::new(SectionScriptGenerator),
            project_id: "default".to_string(),
            escape: EscapeSettings::default(),
        }
    }

    /// Built-in templates over an in-memory record store
    pub fn in_memory(records: InMemoryRecordStore) -> Self {
        Self::new(Arc::new(TemplateRegistry::new()), Arc::new(records))
    }

    /// Apply project id and escaping from a configuration
    pub fn with_config(mut self, config: &ExportConfig) -> Self {
        self.project_id = config.export.project_id.clone();
        self.escape = config.escape.clone();
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateProvider>) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_language_keys(mut self, language_keys: Arc<dyn LanguageKeyGenerator>) -> Self {
        self.language_keys = language_keys;
        self
    }

    pub fn with_scripts(mut self, scripts: Arc<dyn ScriptFunctionGenerator>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_escape(mut self, escape: EscapeSettings) -> Self {
        self.escape = escape;
        self
    }
}
