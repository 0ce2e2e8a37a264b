use std::collections::HashMap;

use crate::model::{Block, CollectionContent};

/// In-memory content of the currently open collection: a map from block
/// identifier to block, paired with the ordered list of identifiers that
/// defines display order.
///
/// Invariant: every identifier in the order list is a key of the map and
/// appears exactly once. All mutations below preserve this; `set_order`
/// refuses orders that would break it.
#[derive(Clone, Debug, Default)]
pub struct ContentStore {
    blocks: HashMap<String, Block>,
    order: Vec<String>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the store from a collection-content response. Identifiers
    /// in the server's order list without a matching block are dropped,
    /// blocks missing from the order list are appended at the end.
    pub fn from_content(content: CollectionContent) -> Self {
        let mut blocks = HashMap::new();
        for block in content.content {
            if let Some(id) = block.id.clone() {
                blocks.insert(id, block);
            }
        }
        let mut order = Vec::with_capacity(blocks.len());
        for id in content.order_list {
            if blocks.contains_key(&id) && !order.contains(&id) {
                order.push(id);
            }
        }
        for id in blocks.keys() {
            if !order.contains(id) {
                order.push(id.clone());
            }
        }
        Self { blocks, order }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|entry| entry == id)
    }

    pub fn id_at(&self, index: usize) -> Option<&str> {
        self.order.get(index).map(String::as_str)
    }

    /// Blocks in display order.
    pub fn ordered_blocks(&self) -> impl Iterator<Item = &Block> {
        self.order.iter().filter_map(|id| self.blocks.get(id))
    }

    /// Identifier of the block immediately before `id` in display order.
    pub fn previous_id(&self, id: &str) -> Option<&str> {
        let index = self.index_of(id)?;
        index.checked_sub(1).and_then(|prev| self.id_at(prev))
    }

    /// Identifier of the block immediately after `id` in display order.
    pub fn next_id(&self, id: &str) -> Option<&str> {
        let index = self.index_of(id)?;
        self.id_at(index + 1)
    }

    /// Insert a block (which must carry its server-assigned identifier)
    /// at `index` in the order list. Returns the identifier on success.
    pub fn insert_at(&mut self, index: usize, block: Block) -> Option<String> {
        let id = block.id.clone()?;
        if self.blocks.contains_key(&id) {
            return None;
        }
        let index = index.min(self.order.len());
        self.blocks.insert(id.clone(), block);
        self.order.insert(index, id.clone());
        Some(id)
    }

    /// Append a block at the end of the order list.
    pub fn push(&mut self, block: Block) -> Option<String> {
        let index = self.order.len();
        self.insert_at(index, block)
    }

    /// Replace the stored block for an identifier that already exists,
    /// keeping its position in the order list.
    pub fn replace(&mut self, id: &str, mut block: Block) -> bool {
        if !self.blocks.contains_key(id) {
            return false;
        }
        if block.id.is_none() {
            block.id = Some(id.to_string());
        }
        self.blocks.insert(id.to_string(), block);
        true
    }

    /// Remove a block from both the map and the order list.
    pub fn remove(&mut self, id: &str) -> Option<Block> {
        let block = self.blocks.remove(id)?;
        self.order.retain(|entry| entry != id);
        Some(block)
    }

    /// Install a new order list. Refused unless it is a permutation of
    /// the current one, which keeps the referential-integrity invariant.
    pub fn set_order(&mut self, order: Vec<String>) -> bool {
        if order.len() != self.blocks.len() {
            return false;
        }
        let mut seen = Vec::with_capacity(order.len());
        for id in &order {
            if !self.blocks.contains_key(id) || seen.contains(&id) {
                return false;
            }
            seen.push(id);
        }
        self.order = order;
        true
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
