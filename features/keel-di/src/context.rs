use std::{
    fmt::Debug,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::node::NodeId;

/// Id of the process wide singleton context
pub const STATIC_CONTEXT_ID: u64 = 1;

/// The context all static (singleton) instances live in
pub const STATIC_CONTEXT: ContextId = ContextId {
    id: STATIC_CONTEXT_ID,
    deriver: None,
};

/// Maps a context onto the context durable instances are cached under
pub type ContextDeriver = Arc<dyn Fn(&ContextId) -> ContextId + Send + Sync>;

/// Identity of one resolution session, usually one inbound request
///
/// Two ids are equal if their numeric ids are equal, the deriver is not compared.
#[derive(Clone)]
pub struct ContextId {
    id: u64,
    deriver: Option<ContextDeriver>,
}
impl ContextId {
    pub(crate) fn new(id: u64, deriver: Option<ContextDeriver>) -> Self {
        ContextId { id, deriver }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_static(&self) -> bool {
        self.id == STATIC_CONTEXT_ID
    }

    /// True if this context maps durable providers onto a parent context
    pub fn is_durable(&self) -> bool {
        self.deriver.is_some()
    }

    /// Applies the parent deriver, if there is one
    pub fn derive(&self) -> Option<ContextId> {
        self.deriver.as_ref().map(|deriver| deriver(self))
    }
}
impl PartialEq for ContextId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ContextId {}
impl Hash for ContextId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl Debug for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextId")
            .field("id", &self.id)
            .field("durable", &self.is_durable())
            .finish()
    }
}

/// Mints context ids, owned by a single container
pub(crate) struct ContextIdGenerator {
    next: AtomicU64,
}
impl ContextIdGenerator {
    pub(crate) fn new() -> Self {
        ContextIdGenerator {
            next: AtomicU64::new(STATIC_CONTEXT_ID + 1),
        }
    }

    pub(crate) fn next(&self, deriver: Option<ContextDeriver>) -> ContextId {
        ContextId::new(self.next.fetch_add(1, Ordering::Relaxed), deriver)
    }
}

/// Who asked for an instance - only used to key transient instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inquirer {
    /// A request made directly against the container
    Root,
    Node(NodeId),
}
