//! Declarative flow documents.
//!
//! A TOML description of blocks with literal fields only. Branching is
//! expressed with a `routes` table that matches the trimmed user input.
//!
//! ```toml
//! start = "ask_math_question"
//!
//! [blocks.ask_math_question]
//! message = "What is 1 + 1?"
//! routes = { when = { "2" = "correct" }, otherwise = "incorrect" }
//!
//! [blocks.correct]
//! message = "Well done!"
//! ```

use crate::block::{Block, Checkboxes, Choice, Field, Options};
use crate::error::ConfigError;
use crate::flow::Flow;
use crate::message::Component;
use crate::path::BlockId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub start: String,
    #[serde(default)]
    pub blocks: BTreeMap<String, BlockDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockDocument {
    pub message: Option<String>,
    pub path: Option<String>,
    pub routes: Option<RouteTable>,
    pub options: Vec<ChoiceDocument>,
    pub checkboxes: Option<CheckboxDocument>,
    pub chat_disabled: Option<bool>,
    pub is_sensitive: Option<bool>,
    pub transition_ms: Option<u64>,
    pub component: Option<Component>,
}

/// Input-matching transition table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    #[serde(default)]
    pub when: BTreeMap<String, String>,
    pub otherwise: Option<String>,
}

impl RouteTable {
    fn targets(&self) -> impl Iterator<Item = &String> {
        self.when.values().chain(self.otherwise.iter())
    }

    fn into_field(self) -> Field<BlockId> {
        Field::sync(move |params| {
            let input = params.user_input.trim();
            self.when
                .get(input)
                .or(self.otherwise.as_ref())
                .map(|target| BlockId::from(target.as_str()))
        })
    }
}

/// Either `"value"` or `{ label = "...", value = "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceDocument {
    Plain(String),
    Labeled(Choice),
}

impl From<ChoiceDocument> for Choice {
    fn from(value: ChoiceDocument) -> Self {
        match value {
            ChoiceDocument::Plain(value) => Choice::new(value.clone(), value),
            ChoiceDocument::Labeled(choice) => choice,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckboxDocument {
    pub items: Vec<ChoiceDocument>,
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl FlowDocument {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Build a validated [`Flow`].
    pub fn into_flow(self) -> Result<Flow, ConfigError> {
        let mut issues = Vec::new();
        for (id, block) in &self.blocks {
            if block.path.is_some() && block.routes.is_some() {
                issues.push(format!("block `{id}` sets both `path` and `routes`"));
            }
            if let Some(routes) = &block.routes {
                for target in routes.targets() {
                    if !self.blocks.contains_key(target) {
                        issues.push(format!("block `{id}` routes to unknown block `{target}`"));
                    }
                }
            }
        }
        if !issues.is_empty() {
            return Err(ConfigError::Invalid(issues.join("; ")));
        }

        let mut builder = Flow::builder(self.start);
        for (id, doc) in self.blocks {
            builder = builder.block(id, doc.into_block());
        }
        builder
            .build()
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

impl BlockDocument {
    fn into_block(self) -> Block {
        let mut block = Block::new();
        block.message = self.message.map(Field::Literal);
        block.path = match (self.path, self.routes) {
            (Some(path), _) => Some(Field::Literal(BlockId::from(path))),
            (None, Some(routes)) => Some(routes.into_field()),
            (None, None) => None,
        };
        if !self.options.is_empty() {
            block.options = Some(Options::new(self.options));
        }
        block.checkboxes = self.checkboxes.map(|doc| {
            let boxes = Checkboxes::new(doc.items);
            let min = doc.min.unwrap_or(boxes.min);
            boxes.range(min, doc.max)
        });
        block.chat_disabled = self.chat_disabled;
        block.is_sensitive = self.is_sensitive.map(Field::Literal);
        block.transition = self.transition_ms.map(|ms| crate::block::TransitionSpec {
            duration: Duration::from_millis(ms),
        });
        block.component = self.component;
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIZ: &str = r#"
start = "start"

[blocks.start]
message = "Pick one"
options = ["quiz", { label = "Leave", value = "bye" }]
path = "ask_math_question"

[blocks.ask_math_question]
message = "What is 1 + 1?"
is_sensitive = false
routes = { when = { "2" = "A" }, otherwise = "B" }

[blocks.A]
message = "Correct"
transition_ms = 500
path = "start"

[blocks.B]
message = "Try again"
checkboxes = { items = ["x", "y"], max = 1 }
"#;

    #[test]
    fn test_parse_and_build() {
        let flow = FlowDocument::from_toml_str(QUIZ).unwrap().into_flow().unwrap();

        let start = flow.get("start").unwrap();
        let options = start.options.as_ref().unwrap();
        assert_eq!(options.items[0], Choice::new("quiz", "quiz"));
        assert_eq!(options.items[1], Choice::new("Leave", "bye"));

        let a = flow.get("A").unwrap();
        assert_eq!(
            a.transition.map(|t| t.duration),
            Some(Duration::from_millis(500))
        );

        let boxes = flow.get("B").unwrap().checkboxes.as_ref().unwrap();
        assert_eq!((boxes.min, boxes.max), (1, Some(1)));
    }

    #[test]
    fn test_unknown_route_target() {
        let doc = r#"
start = "a"
[blocks.a]
routes = { when = { "yes" = "missing" } }
"#;
        let err = FlowDocument::from_toml_str(doc).unwrap().into_flow().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_path_and_routes_conflict() {
        let doc = r#"
start = "a"
[blocks.a]
path = "a"
routes = { otherwise = "a" }
"#;
        let err = FlowDocument::from_toml_str(doc).unwrap().into_flow().unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let doc = "start = \"a\"\n[blocks.a]\nmesage = \"typo\"\n";
        assert!(matches!(
            FlowDocument::from_toml_str(doc),
            Err(ConfigError::Parse(_))
        ));
    }
}
