//! NPC lifecycle tracking.
//!
//! NPCs start as a mention and rise through encounter, recurring and
//! significant as their appearances accumulate. `Core` is only reached by
//! manual promotion. The pool has a hard capacity: once full, unknown NPCs
//! are dropped but known ones keep updating.

mod entity;
mod pool;
mod relationship;

pub use entity::{Appearance, Npc, NpcId, NpcLifecycle};
pub use pool::{NpcInteraction, NpcPool, DEFAULT_MAX_ACTIVE};
pub use relationship::{NpcRelationship, RoleKind};
