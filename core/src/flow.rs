//! Flow - the Block Registry
//!
//! A read-only mapping from block id to [`Block`], plus the id of the block a
//! session starts on.

use crate::block::Block;
use crate::error::FlowError;
use crate::path::BlockId;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Flow {
    start: BlockId,
    blocks: HashMap<BlockId, Block>,
}

impl Flow {
    pub fn builder(start: impl Into<BlockId>) -> FlowBuilder {
        FlowBuilder {
            start: start.into(),
            blocks: HashMap::new(),
        }
    }

    pub fn start(&self) -> &BlockId {
        &self.start
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &BlockId> {
        self.blocks.keys()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Check what can be checked statically: the start block exists and
    /// every literal path points at a registered block.
    pub fn validate(&self) -> Result<(), FlowError> {
        let mut issues = Vec::new();
        if !self.contains(self.start.as_str()) {
            issues.push(format!("start block `{}` is not registered", self.start));
        }

        let mut ids: Vec<&BlockId> = self.blocks.keys().collect();
        ids.sort();
        for id in ids {
            let target = self.blocks[id]
                .path
                .as_ref()
                .and_then(|field| field.as_literal());
            if let Some(target) = target {
                if !self.contains(target.as_str()) {
                    issues.push(format!("block `{id}` points at unknown block `{target}`"));
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(FlowError::Invalid(issues))
        }
    }
}

pub struct FlowBuilder {
    start: BlockId,
    blocks: HashMap<BlockId, Block>,
}

impl FlowBuilder {
    /// Register a block. A later registration with the same id replaces the earlier one.
    pub fn block(mut self, id: impl Into<BlockId>, block: Block) -> Self {
        self.blocks.insert(id.into(), block);
        self
    }

    /// Build and validate the flow.
    pub fn build(self) -> Result<Flow, FlowError> {
        let flow = self.build_unchecked();
        flow.validate()?;
        Ok(flow)
    }

    pub fn build_unchecked(self) -> Flow {
        Flow {
            start: self.start,
            blocks: self.blocks,
        }
    }
}
