// ── Entity store ──
//
// Connection-scoped state plus the local property catalogue and the
// transport log. Single writer: the controller's reconciler task.

pub(crate) mod collection;
pub(crate) mod partial;
mod reconcile;
mod registry;

pub use reconcile::ChangeSet;
pub use registry::{Registry, Scoped, Snapshot};
