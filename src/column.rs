use std::fmt;
use std::sync::Arc;

use serde_json::Value;

type HeaderFn = dyn Fn(&str) -> String + Send + Sync;
type StringifyFn = dyn Fn(&Value) -> String + Send + Sync;

/// Header content of a column: a fixed label or a function of the column key.
#[derive(Clone)]
pub enum Header {
    Label(String),
    Render(Arc<HeaderFn>),
}

impl Header {
    pub fn render(&self, key: &str) -> String {
        match self {
            Header::Label(label) => label.clone(),
            Header::Render(f) => f(key),
        }
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Header::Label(label) => f.debug_tuple("Label").field(label).finish(),
            Header::Render(_) => f.write_str("Render(..)"),
        }
    }
}

/// Custom filter text for a column, applied to any value kind.
#[derive(Clone)]
pub struct Stringifier(Arc<StringifyFn>);

impl Stringifier {
    pub fn new(f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Stringifier(Arc::new(f))
    }

    /// Structural serialization, makes nested values searchable.
    pub fn json() -> Self {
        Stringifier::new(|value| match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        })
    }

    pub fn apply(&self, value: &Value) -> String {
        (self.0)(value)
    }
}

impl fmt::Debug for Stringifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Stringifier(..)")
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    key: String,
    header: Header,
    filterable: bool,
    stringifier: Option<Stringifier>,
}

impl ColumnDef {
    /// A column reading `key`, labeled with the key itself.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        ColumnDef {
            header: Header::Label(key.clone()),
            key,
            filterable: false,
            stringifier: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.header = Header::Label(label.into());
        self
    }

    pub fn header_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.header = Header::Render(Arc::new(f));
        self
    }

    pub fn filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    /// Filter this column through `stringifier`. Implies `filterable(true)`.
    pub fn stringifier(mut self, stringifier: Stringifier) -> Self {
        self.stringifier = Some(stringifier);
        self.filterable = true;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn header_text(&self) -> String {
        self.header.render(&self.key)
    }

    pub fn is_filterable(&self) -> bool {
        self.filterable
    }

    pub fn custom_stringifier(&self) -> Option<&Stringifier> {
        self.stringifier.as_ref()
    }
}
