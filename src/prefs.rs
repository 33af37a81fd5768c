use crate::types::{Preferences, PreferencesUpdate};

/// Mutable store for session preferences. Reads hand out clones so callers
/// cannot reach the internal state; `reset` restores the startup defaults.
pub struct PreferenceStore {
    current: Preferences,
    defaults: Preferences,
}

impl PreferenceStore {
    pub fn new(defaults: Preferences) -> Self {
        Self {
            current: defaults.clone(),
            defaults,
        }
    }

    pub fn get(&self) -> Preferences {
        self.current.clone()
    }

    /// Shallow merge: only fields set in the update change; the category
    /// list is replaced wholesale, never appended to.
    pub fn set(&mut self, update: PreferencesUpdate) -> Preferences {
        if let Some(v) = update.default_location {
            self.current.default_location = v;
        }
        if let Some(v) = update.default_radius {
            self.current.default_radius = v;
        }
        if let Some(v) = update.favorite_categories {
            self.current.favorite_categories = v;
        }
        if let Some(v) = update.exclude_children {
            self.current.exclude_children = v;
        }
        self.current.clone()
    }

    pub fn reset(&mut self) -> Preferences {
        self.current = self.defaults.clone();
        self.current.clone()
    }
}
