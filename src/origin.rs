//! Origin groups: trackables sharing one coordinate frame.
//!
//! Each frame one visible member is chosen as the base. Everything in the
//! group is positioned relative to it, so the base should not change while
//! it stays visible.

use std::sync::{Arc, Weak};

use tracing::{debug, info};

use crate::tracking::Trackable;

/// How an origin group collects its members from the scene.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FindMode {
    /// Every trackable in the scene.
    #[default]
    AutoAll,
    /// Trackables whose tag is in the list.
    AutoByTags(Vec<String>),
    /// Members are added explicitly.
    Manual,
}

impl FindMode {
    /// Whether a trackable with `tag` is collected automatically.
    pub fn accepts(&self, tag: &str) -> bool {
        match self {
            Self::AutoAll => true,
            Self::AutoByTags(tags) => tags.iter().any(|t| t == tag),
            Self::Manual => false,
        }
    }
}

pub struct OriginGroup {
    name: String,
    find_mode: FindMode,
    /// Priority order for base selection.
    members: Vec<Arc<Trackable>>,
    current_base: Option<Weak<Trackable>>,
}

impl OriginGroup {
    pub fn new(name: impl Into<String>, find_mode: FindMode) -> Self {
        Self {
            name: name.into(),
            find_mode,
            members: Vec::new(),
            current_base: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn find_mode(&self) -> &FindMode {
        &self.find_mode
    }

    /// Change the find mode and re-collect members from `candidates`.
    pub fn set_find_mode<'a>(
        &mut self,
        find_mode: FindMode,
        candidates: impl IntoIterator<Item = &'a Arc<Trackable>>,
    ) {
        if self.find_mode != find_mode {
            self.find_mode = find_mode;
            self.find_members(candidates);
        }
    }

    /// Append a member, or put it first when `at_head`.
    pub fn add_member(&mut self, trackable: Arc<Trackable>, at_head: bool) {
        if self.contains(&trackable) {
            return;
        }
        if at_head {
            self.members.insert(0, trackable);
        } else {
            self.members.push(trackable);
        }
    }

    /// Remove a member. Clears the base if it was this member.
    pub fn remove_member(&mut self, trackable: &Arc<Trackable>) -> bool {
        if self.is_base(trackable) {
            self.current_base = None;
        }
        let before = self.members.len();
        self.members.retain(|m| !Arc::ptr_eq(m, trackable));
        self.members.len() != before
    }

    pub fn remove_all(&mut self) {
        self.current_base = None;
        self.members.clear();
    }

    /// Replace the member list with the candidates the find mode accepts,
    /// keeping candidate order.
    pub fn find_members<'a>(&mut self, candidates: impl IntoIterator<Item = &'a Arc<Trackable>>) {
        self.remove_all();
        if self.find_mode == FindMode::Manual {
            return;
        }
        for t in candidates {
            if self.find_mode.accepts(t.tag()) {
                self.members.push(t.clone());
            }
        }
        debug!(
            "origin '{}': {} trackables eligible as base",
            self.name,
            self.members.len()
        );
    }

    /// Offer a newly created trackable; it joins if the find mode accepts it.
    pub fn offer(&mut self, trackable: &Arc<Trackable>) -> bool {
        if self.find_mode.accepts(trackable.tag()) && !self.contains(trackable) {
            self.members.push(trackable.clone());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, trackable: &Arc<Trackable>) -> bool {
        self.members.iter().any(|m| Arc::ptr_eq(m, trackable))
    }

    pub fn members(&self) -> &[Arc<Trackable>] {
        &self.members
    }

    /// Choose this frame's base. Run after every member has updated.
    ///
    /// A base that is still visible is kept. Otherwise the first visible
    /// member in list order becomes the base. `None` means the whole group is
    /// untracked this frame.
    pub fn resolve_base(&mut self) -> Option<Arc<Trackable>> {
        if let Some(base) = self.base() {
            if base.is_visible() {
                return Some(base);
            }
        }

        let previous = self.current_base.take();
        let next = self.members.iter().find(|m| m.is_visible()).cloned();
        if let Some(base) = &next {
            let changed = previous.as_ref().is_none_or(|p| !Weak::ptr_eq(p, &Arc::downgrade(base)));
            if changed {
                info!("origin '{}': {} '{}' became base", self.name, base.id(), base.tag());
            }
            self.current_base = Some(Arc::downgrade(base));
        } else if previous.is_some() {
            debug!("origin '{}': no base visible", self.name);
        }
        next
    }

    /// Base chosen by the last [`resolve_base`](Self::resolve_base).
    pub fn base(&self) -> Option<Arc<Trackable>> {
        self.current_base.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_base(&self, trackable: &Arc<Trackable>) -> bool {
        self.base().is_some_and(|b| Arc::ptr_eq(&b, trackable))
    }
}
