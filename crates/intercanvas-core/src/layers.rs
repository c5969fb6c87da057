//! Paint and interaction order.
//!
//! The stack is an ordered list of layers, back to front. The synthetic
//! [`BACKGROUND_LAYER_ID`] layer is always present at z = 0, and after every
//! operation the z-indices are exactly `0..len` in list order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Id of the pinned background layer.
pub const BACKGROUND_LAYER_ID: &str = "background";

/// One entry in the layer stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    pub name: String,
    pub z: usize,
}

/// Ordered layers, back to front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStack {
    /// A stack holding only the background layer.
    pub fn new() -> Self {
        Self {
            layers: vec![Layer {
                id: BACKGROUND_LAYER_ID.to_string(),
                name: "Background".to_string(),
                z: 0,
            }],
        }
    }

    /// Rebuild a stack from a persisted id list.
    ///
    /// `background` is forced to the bottom whether or not the list has it,
    /// and repeated ids keep their first position. Names come from `name_of`
    /// and fall back to the id.
    pub fn from_ids<I, S, F>(ids: I, mut name_of: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&str) -> Option<String>,
    {
        let mut stack = Self::new();
        for id in ids {
            let id = id.as_ref();
            let name = name_of(id).unwrap_or_else(|| id.to_string());
            stack.append(id, name);
        }
        stack
    }

    /// Add a layer on top. Returns false for `background` or an id already present.
    pub fn append(&mut self, id: impl Into<String>, name: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        let z = self.layers.len();
        self.layers.push(Layer {
            id,
            name: name.into(),
            z,
        });
        true
    }

    /// Swap a layer with the one above it.
    pub fn move_up(&mut self, id: &str) -> bool {
        if id == BACKGROUND_LAYER_ID {
            return false;
        }
        match self.position(id) {
            Some(pos) if pos + 1 < self.layers.len() => {
                self.layers.swap(pos, pos + 1);
                self.recompact();
                true
            }
            _ => false,
        }
    }

    /// Swap a layer with the one below it, unless that one is the background.
    pub fn move_down(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(pos) if pos > 0 && self.layers[pos - 1].id != BACKGROUND_LAYER_ID => {
                self.layers.swap(pos, pos - 1);
                self.recompact();
                true
            }
            _ => false,
        }
    }

    /// Move a layer to the very top.
    pub fn bring_to_front(&mut self, id: &str) -> bool {
        if id == BACKGROUND_LAYER_ID {
            return false;
        }
        match self.position(id) {
            Some(pos) if pos + 1 < self.layers.len() => {
                let layer = self.layers.remove(pos);
                self.layers.push(layer);
                self.recompact();
                true
            }
            _ => false,
        }
    }

    /// Move a layer directly above the background.
    pub fn send_to_back(&mut self, id: &str) -> bool {
        if id == BACKGROUND_LAYER_ID {
            return false;
        }
        let floor = usize::from(self.contains(BACKGROUND_LAYER_ID));
        match self.position(id) {
            Some(pos) if pos > floor => {
                let layer = self.layers.remove(pos);
                self.layers.insert(floor, layer);
                self.recompact();
                true
            }
            _ => false,
        }
    }

    /// Remove every listed id; survivors keep their relative order.
    /// The background layer is never removed. Returns how many were removed.
    pub fn remove_many<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let doomed: HashSet<&str> = ids
            .iter()
            .map(|id| id.as_ref())
            .filter(|id| *id != BACKGROUND_LAYER_ID)
            .collect();
        let before = self.layers.len();
        self.layers.retain(|layer| !doomed.contains(layer.id.as_str()));
        self.recompact();
        before - self.layers.len()
    }

    /// Remove layers whose id satisfies `pred` (never the background).
    pub fn remove_where(&mut self, mut pred: impl FnMut(&str) -> bool) -> Vec<String> {
        let doomed: Vec<String> = self
            .layers
            .iter()
            .filter(|layer| layer.id != BACKGROUND_LAYER_ID && pred(&layer.id))
            .map(|layer| layer.id.clone())
            .collect();
        self.remove_many(doomed.as_slice());
        doomed
    }

    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> bool {
        match self.layers.iter_mut().find(|layer| layer.id == id) {
            Some(layer) => {
                layer.name = name.into();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn z_of(&self, id: &str) -> Option<usize> {
        self.layers.iter().find(|layer| layer.id == id).map(|layer| layer.z)
    }

    pub fn get(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// Layers back to front.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Ids back to front, background included.
    pub fn ids(&self) -> Vec<String> {
        self.layers.iter().map(|layer| layer.id.clone()).collect()
    }

    /// id -> z lookup, as persisted alongside the id list.
    pub fn z_index_map(&self) -> BTreeMap<String, usize> {
        self.layers
            .iter()
            .map(|layer| (layer.id.clone(), layer.z))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == id)
    }

    fn recompact(&mut self) {
        for (z, layer) in self.layers.iter_mut().enumerate() {
            layer.z = z;
        }
    }
}
