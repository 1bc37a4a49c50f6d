//! Resolution context passed to every resolver

use crate::model::{DialogNode, FlexField, FlexFieldObject, LanguageKey, ObjectType, ScriptFunction};

/// One dialog node being rendered as part of a dialog function
#[derive(Debug, Clone, PartialEq)]
pub struct DialogStep {
    pub owner_id: String,
    pub owner_name: String,
    pub dialog_id: String,
    pub node: DialogNode,
    /// Function each choice option leads to, in option order
    pub option_functions: Vec<Option<String>>,
    /// Function entered when the flow continues into another function
    pub next_function: Option<String>,
}

/// A script function generated for a schedule event
#[derive(Debug, Clone, PartialEq)]
pub struct EventFunction {
    pub event_id: String,
    pub function: ScriptFunction,
}

/// The primary record a render produces output for
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Object(FlexFieldObject),
    Objects(Vec<FlexFieldObject>),
    DialogFunction(ScriptFunction),
    DialogStep(DialogStep),
    ScheduleEvent(EventFunction),
    SnippetFunction(ScriptFunction),
}

impl Subject {
    pub fn type_name(&self) -> &'static str {
        match self {
            Subject::Object(_) => "object",
            Subject::Objects(_) => "object list",
            Subject::DialogFunction(_) => "dialog function",
            Subject::DialogStep(_) => "dialog step",
            Subject::ScheduleEvent(_) => "schedule event",
            Subject::SnippetFunction(_) => "snippet function",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub subject: Subject,
    /// Domain tag used when deriving language keys
    pub object_type: ObjectType,
    /// Language keys the subject references but does not own
    pub referenced_keys: Vec<LanguageKey>,
}

impl RenderContext {
    pub fn new(subject: Subject, object_type: ObjectType) -> Self {
        Self {
            subject,
            object_type,
            referenced_keys: Vec::new(),
        }
    }

    pub fn for_object(object: FlexFieldObject) -> Self {
        let object_type = object.object_type;
        Self::new(Subject::Object(object), object_type)
    }

    pub fn with_referenced_keys(mut self, keys: Vec<LanguageKey>) -> Self {
        self.referenced_keys = keys;
        self
    }

    /// Replace the subject object's field list
    ///
    /// Has no effect on subjects other than a single object.
    pub fn with_fields(mut self, fields: Vec<FlexField>) -> Self {
        if let Subject::Object(object) = &mut self.subject {
            object.fields = fields;
        }
        self
    }
}
