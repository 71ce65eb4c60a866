//! Block - a node of the conversation graph
//!
//! Every dynamic field is a [`Field`]: either a literal value or a resolver
//! over the turn's [`Parameters`]. Resolvers always return a future, so sync
//! and async callbacks go through the same `resolve` call.

use crate::message::Component;
use crate::params::Parameters;
use crate::path::BlockId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::{Future, ready};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Type alias for the boxed futures returned by block callbacks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A resolver computes a field value from the turn's parameters.
/// `Ok(None)` means "no value" (no bubble, no transition, ...).
pub type Resolver<T> =
    Arc<dyn Fn(Parameters) -> BoxFuture<'static, anyhow::Result<Option<T>>> + Send + Sync>;

/// A side-effecting block callback (`function` and `file`).
pub type Action = Arc<dyn Fn(Parameters) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Literal value or resolver.
pub enum Field<T> {
    Literal(T),
    Resolver(Resolver<T>),
}

impl<T> Field<T>
where
    T: Clone + Send + 'static,
{
    pub fn literal(value: impl Into<T>) -> Self {
        Field::Literal(value.into())
    }

    /// Wrap an async resolver.
    pub fn resolver<F, Fut>(f: F) -> Self
    where
        F: Fn(Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        Field::Resolver(Arc::new(move |params| Box::pin(f(params))))
    }

    /// Wrap a plain function as an already-completed resolver.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Parameters) -> Option<T> + Send + Sync + 'static,
    {
        Field::Resolver(Arc::new(move |params| {
            let value = f(&params);
            Box::pin(ready(Ok(value)))
        }))
    }

    pub async fn resolve(&self, params: &Parameters) -> anyhow::Result<Option<T>> {
        match self {
            Field::Literal(value) => Ok(Some(value.clone())),
            Field::Resolver(resolver) => resolver(params.clone()).await,
        }
    }

    pub fn as_literal(&self) -> Option<&T> {
        match self {
            Field::Literal(value) => Some(value),
            Field::Resolver(_) => None,
        }
    }
}

impl<T: Clone> Clone for Field<T> {
    fn clone(&self) -> Self {
        match self {
            Field::Literal(value) => Field::Literal(value.clone()),
            Field::Resolver(resolver) => Field::Resolver(Arc::clone(resolver)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Field::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// One selectable choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

impl From<&str> for Choice {
    fn from(value: &str) -> Self {
        Choice::new(value, value)
    }
}

/// Single-choice buttons shown under the block's message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Options {
    pub items: Vec<Choice>,
}

impl Options {
    pub fn new<I, C>(items: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Choice>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.items.iter().any(|c| c.value == value)
    }
}

/// Multi-choice checkboxes with a selection range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkboxes {
    pub items: Vec<Choice>,
    #[serde(default = "default_min")]
    pub min: usize,
    #[serde(default)]
    pub max: Option<usize>,
}

fn default_min() -> usize {
    1
}

impl Checkboxes {
    pub fn new<I, C>(items: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Choice>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            min: default_min(),
            max: None,
        }
    }

    pub fn range(mut self, min: usize, max: Option<usize>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// A selection is acceptable when every value is known, none repeats and
    /// the count lies within `[min, max]`.
    pub fn accepts(&self, values: &[String]) -> bool {
        let known = values
            .iter()
            .all(|v| self.items.iter().any(|c| &c.value == v));
        let unique = values
            .iter()
            .enumerate()
            .all(|(i, v)| !values[..i].contains(v));
        let max = self.max.unwrap_or(self.items.len());
        known && unique && values.len() >= self.min && values.len() <= max
    }
}

/// Automatic advance after a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionSpec {
    pub duration: Duration,
}

/// A conversation state.
#[derive(Clone, Default)]
pub struct Block {
    pub message: Option<Field<String>>,
    pub path: Option<Field<BlockId>>,
    pub options: Option<Options>,
    pub checkboxes: Option<Checkboxes>,
    pub function: Option<Action>,
    pub file: Option<Action>,
    pub chat_disabled: Option<bool>,
    pub is_sensitive: Option<Field<bool>>,
    pub transition: Option<TransitionSpec>,
    pub component: Option<Component>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.message = Some(Field::Literal(text.into()));
        self
    }

    pub fn message_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Parameters) -> Option<String> + Send + Sync + 'static,
    {
        self.message = Some(Field::sync(f));
        self
    }

    pub fn message_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<String>>> + Send + 'static,
    {
        self.message = Some(Field::resolver(f));
        self
    }

    pub fn path(mut self, next: impl Into<BlockId>) -> Self {
        self.path = Some(Field::Literal(next.into()));
        self
    }

    pub fn path_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Parameters) -> Option<BlockId> + Send + Sync + 'static,
    {
        self.path = Some(Field::sync(f));
        self
    }

    pub fn path_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<BlockId>>> + Send + 'static,
    {
        self.path = Some(Field::resolver(f));
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    pub fn checkboxes(mut self, checkboxes: Checkboxes) -> Self {
        self.checkboxes = Some(checkboxes);
        self
    }

    pub fn function<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.function = Some(Arc::new(move |params| Box::pin(f(params))));
        self
    }

    pub fn file<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.file = Some(Arc::new(move |params| Box::pin(f(params))));
        self
    }

    pub fn chat_disabled(mut self, disabled: bool) -> Self {
        self.chat_disabled = Some(disabled);
        self
    }

    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.is_sensitive = Some(Field::Literal(sensitive));
        self
    }

    pub fn sensitive_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Parameters) -> Option<bool> + Send + Sync + 'static,
    {
        self.is_sensitive = Some(Field::sync(f));
        self
    }

    pub fn sensitive_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<bool>>> + Send + 'static,
    {
        self.is_sensitive = Some(Field::resolver(f));
        self
    }

    pub fn transition(mut self, duration: Duration) -> Self {
        self.transition = Some(TransitionSpec { duration });
        self
    }

    pub fn component(mut self, component: Component) -> Self {
        self.component = Some(component);
        self
    }

    /// Whether the input area should offer attachments while this block is current.
    pub fn allows_attachment(&self) -> bool {
        self.file.is_some()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("message", &self.message)
            .field("path", &self.path)
            .field("options", &self.options)
            .field("checkboxes", &self.checkboxes)
            .field("function", &self.function.is_some())
            .field("file", &self.file.is_some())
            .field("chat_disabled", &self.chat_disabled)
            .field("is_sensitive", &self.is_sensitive)
            .field("transition", &self.transition)
            .field("component", &self.component)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkbox_range() {
        let boxes = Checkboxes::new(["a", "b", "c"]).range(1, Some(2));
        assert!(boxes.accepts(&["a".to_string()]));
        assert!(boxes.accepts(&["a".to_string(), "c".to_string()]));
        assert!(!boxes.accepts(&[]));
        assert!(!boxes.accepts(&["a".into(), "b".into(), "c".into()]));
        assert!(!boxes.accepts(&["a".into(), "a".into()]));
        assert!(!boxes.accepts(&["z".to_string()]));
    }

    #[test]
    fn test_options_contains_value_not_label() {
        let options = Options::new([Choice::new("Tour", "tour info please")]);
        assert!(options.contains("tour info please"));
        assert!(!options.contains("Tour"));
    }

    #[test]
    fn test_literal_field_debug() {
        let field: Field<String> = Field::literal("hi");
        assert_eq!(format!("{field:?}"), "Literal(\"hi\")");
        let field: Field<String> = Field::sync(|_| None);
        assert_eq!(format!("{field:?}"), "Resolver(..)");
    }

    #[test]
    fn test_attachment_follows_file_handler() {
        assert!(!Block::new().allows_attachment());
        assert!(Block::new().file(|_| async { Ok(()) }).allows_attachment());
    }
}
