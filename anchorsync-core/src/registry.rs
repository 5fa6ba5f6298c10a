//! Used-model registry and the anchor naming convention.
//!
//! # Naming convention
//!
//! ```text
//! <ANCHOR_PREFIX><model id>      e.g. "model-42"
//! ```
//!
//! The anchor name is the only link between a tracking-session anchor and an
//! application model. Anything without the prefix is a foreign anchor (planes,
//! focus indicators, ...) and every pipeline ignores it.

use crate::types::{Anchor, Model, ModelId, Renderable};

/// Reserved prefix for anchors that carry a model.
pub const ANCHOR_PREFIX: &str = "model-";

/// `"<ANCHOR_PREFIX><model_id>"`
pub fn anchor_name_for(model_id: &ModelId) -> String {
    format!("{ANCHOR_PREFIX}{}", model_id.0)
}

/// Model id encoded in `name`, or `None` for foreign names.
pub fn model_id_from_anchor_name(name: &str) -> Option<ModelId> {
    match name.strip_prefix(ANCHOR_PREFIX) {
        Some(id) if !id.is_empty() => Some(ModelId::from(id)),
        _ => None,
    }
}

/// `true` if `anchor` is named per the convention.
pub fn is_model_anchor(anchor: &Anchor) -> bool {
    anchor
        .name
        .as_deref()
        .and_then(model_id_from_anchor_name)
        .is_some()
}

/// Models currently placed in the session, in placement order.
#[derive(Debug, Clone, Default)]
pub struct AnchorRegistry {
    used_models: Vec<Model>,
    marked_for_deletion: Option<Renderable>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `model` to the used list. Callers must not add the same id twice.
    pub fn add_used_model(&mut self, model: Model) {
        self.used_models.push(model);
    }

    /// Look a model up by its encoded anchor name.
    pub fn find_used_model(&self, encoded_name: &str) -> Option<&Model> {
        let id = model_id_from_anchor_name(encoded_name)?;
        self.used_models.iter().find(|model| model.id == id)
    }

    /// [`find_used_model`](Self::find_used_model) for an anchor; unnamed
    /// anchors never match.
    pub fn find_for_anchor(&self, anchor: &Anchor) -> Option<&Model> {
        anchor
            .name
            .as_deref()
            .and_then(|name| self.find_used_model(name))
    }

    pub fn used_models(&self) -> &[Model] {
        &self.used_models
    }

    /// Record the UI's intent to remove `renderable`. The tracking session is
    /// not touched here.
    pub fn mark_for_deletion(&mut self, renderable: Renderable) {
        self.marked_for_deletion = Some(renderable);
    }

    pub fn marked_for_deletion(&self) -> Option<&Renderable> {
        self.marked_for_deletion.as_ref()
    }

    /// Clear and return the pending deletion intent.
    pub fn take_marked_for_deletion(&mut self) -> Option<Renderable> {
        self.marked_for_deletion.take()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
