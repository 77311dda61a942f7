//! Profession catalogue lookup.
//!
//! Professions are static game content owned outside the coordinator; at
//! ready-up clients send only a profession id and the orchestrator
//! resolves it through a [`ProfessionCatalog`]. [`StaticCatalog`] is the
//! in-process implementation, loaded once at startup.

use std::collections::HashMap;

use ratrace_protocol::Profession;

/// Resolves profession ids into full profession payloads.
pub trait ProfessionCatalog: Send + Sync + 'static {
    fn resolve(&self, id: u32) -> Option<Profession>;
}

/// A fixed, in-memory profession table.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    professions: HashMap<u32, Profession>,
}

impl StaticCatalog {
    pub fn new(professions: impl IntoIterator<Item = Profession>) -> Self {
        Self {
            professions: professions
                .into_iter()
                .map(|p| (p.id, p))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.professions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.professions.is_empty()
    }
}

impl ProfessionCatalog for StaticCatalog {
    fn resolve(&self, id: u32) -> Option<Profession> {
        self.professions.get(&id).cloned()
    }
}

// =========================================================================
// Tests
// =========================================================================
