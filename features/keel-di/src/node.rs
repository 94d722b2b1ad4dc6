use std::{
    collections::HashMap,
    fmt::{Debug, Display},
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};

use futures_channel::oneshot;

use crate::{
    context::Inquirer,
    errors::ResolveError,
    graph::Link,
    module::ModuleId,
    provider::{Dependency, Provider, ProviderDefinition, Scope},
    types::{Instance, Token},
};

/// Index of a provider node in the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);
impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type SlotWaiter = oneshot::Sender<Result<Instance, ResolveError>>;
pub(crate) type SlotReceiver = oneshot::Receiver<Result<Instance, ResolveError>>;

/// Key of one cached instance of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotKey {
    pub(crate) context: u64,
    /// Only set for transient nodes
    pub(crate) inquirer: Option<Inquirer>,
}

enum Slot {
    Pending {
        generation: u64,
        waiters: Vec<SlotWaiter>,
    },
    Resolved(Instance),
}

#[derive(Default)]
struct Slots {
    next_generation: u64,
    slots: HashMap<SlotKey, Slot>,
}

/// Result of asking a node for a slot
pub(crate) enum Claim {
    Resolved(Instance),
    /// Someone else is resolving the slot - wait for them
    Pending(SlotReceiver),
    /// The slot was free, the caller now owns the pending slot with this generation
    Vacant(u64),
}

/// A provider together with the instances it produced
pub(crate) struct ProviderNode {
    pub(crate) id: NodeId,
    pub(crate) token: Token,
    pub(crate) module: ModuleId,
    pub(crate) definition: ProviderDefinition,
    pub(crate) scope: Scope,
    pub(crate) durable: bool,
    pub(crate) dependencies: Vec<Dependency>,

    /// Dependencies resolved to nodes, computed once the graph is sealed
    pub(crate) links: OnceLock<Vec<Link>>,
    pub(crate) is_static: OnceLock<bool>,
    pub(crate) is_durable: OnceLock<bool>,

    instances: Mutex<Slots>,
}
impl Debug for ProviderNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderNode")
            .field("id", &self.id)
            .field("token", &self.token)
            .field("module", &self.module)
            .field("scope", &self.scope)
            .field("durable", &self.durable)
            .field("definition", &self.definition)
            .finish()
    }
}

impl ProviderNode {
    pub(crate) fn new(id: NodeId, module: ModuleId, provider: Provider) -> Self {
        let Provider {
            token,
            definition,
            scope,
            durable,
        } = provider;

        ProviderNode {
            id,
            token,
            module,
            dependencies: definition.dependencies(),
            definition,
            scope,
            durable,
            links: OnceLock::new(),
            is_static: OnceLock::new(),
            is_durable: OnceLock::new(),
            instances: Mutex::new(Slots::default()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached instance, subscribes to a pending one, or claims the slot
    pub(crate) fn claim(&self, key: SlotKey) -> Claim {
        let mut guard = self.slots();
        let slots = &mut *guard;

        match slots.slots.get_mut(&key) {
            Some(Slot::Resolved(instance)) => Claim::Resolved(instance.clone()),
            Some(Slot::Pending { waiters, .. }) => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Claim::Pending(rx)
            }
            None => {
                let generation = slots.next_generation;
                slots.next_generation += 1;
                slots.slots.insert(
                    key,
                    Slot::Pending {
                        generation,
                        waiters: Vec::new(),
                    },
                );
                Claim::Vacant(generation)
            }
        }
    }

    /// Completes a claimed slot and informs all waiters
    ///
    /// Successful results are only cached if the slot was not released in the meantime.
    /// Failures are never cached.
    pub(crate) fn publish(
        &self,
        key: SlotKey,
        generation: u64,
        result: Result<Instance, ResolveError>,
    ) -> Result<Instance, ResolveError> {
        let waiters = {
            let mut slots = self.slots();
            match slots.slots.remove(&key) {
                Some(Slot::Pending {
                    generation: current,
                    waiters,
                }) if current == generation => {
                    if let Ok(instance) = &result {
                        slots.slots.insert(key, Slot::Resolved(instance.clone()));
                    }
                    waiters
                }
                // Slot belongs to someone else (released and claimed again) - put it back
                Some(other) => {
                    slots.slots.insert(key, other);
                    Vec::new()
                }
                None => Vec::new(),
            }
        };

        for waiter in waiters {
            // Error can be ignored as it just means the receiver was dropped
            let _ = waiter.send(result.clone());
        }
        result
    }

    /// Drops a claimed slot without result, waiters observe a closed channel
    pub(crate) fn abandon(&self, key: SlotKey, generation: u64) {
        let mut slots = self.slots();
        if let Some(Slot::Pending {
            generation: current,
            ..
        }) = slots.slots.get(&key)
        {
            if *current == generation {
                slots.slots.remove(&key);
            }
        }
    }

    /// Drops the cached `instance`, unless the slot was refilled since
    pub(crate) fn invalidate(&self, key: SlotKey, instance: &Instance) -> bool {
        let mut slots = self.slots();
        match slots.slots.get(&key) {
            Some(Slot::Resolved(cached)) if cached.ptr_eq(instance) => {
                slots.slots.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Drops all slots of a context, returns how many were dropped
    pub(crate) fn release(&self, context: u64) -> usize {
        let mut slots = self.slots();
        let before = slots.slots.len();
        slots.slots.retain(|key, _| key.context != context);
        before - slots.slots.len()
    }

    /// Number of resolved instances held by this node
    #[cfg(test)]
    pub(crate) fn instance_count(&self) -> usize {
        self.slots()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Resolved(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::{Claim, NodeId, ProviderNode, SlotKey};
    use crate::{
        errors::ResolveError,
        module::ModuleId,
        provider::Provider,
        types::{Instance, Token},
    };

    fn node() -> ProviderNode {
        ProviderNode::new(NodeId(0), ModuleId(0), Provider::value(1_u8))
    }

    const KEY: SlotKey = SlotKey {
        context: 5,
        inquirer: None,
    };

    #[test]
    fn only_the_first_claim_owns_the_slot() {
        let node = node();

        let Claim::Vacant(generation) = node.claim(KEY) else {
            panic!("first claim must own the slot");
        };
        let Claim::Pending(mut rx) = node.claim(KEY) else {
            panic!("second claim must wait");
        };

        let instance = Instance::new(2_u8);
        node.publish(KEY, generation, Ok(instance.clone())).unwrap();

        assert!(rx.try_recv().unwrap().unwrap().unwrap().ptr_eq(&instance));
        assert!(matches!(node.claim(KEY), Claim::Resolved(cached) if cached.ptr_eq(&instance)));
        assert_eq!(node.instance_count(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let node = node();
        let Claim::Vacant(generation) = node.claim(KEY) else {
            panic!("first claim must own the slot");
        };
        let Claim::Pending(mut rx) = node.claim(KEY) else {
            panic!("second claim must wait");
        };

        let error = ResolveError::Abandoned {
            token: Token::of::<u8>(),
        };
        assert!(node.publish(KEY, generation, Err(error)).is_err());

        assert!(rx.try_recv().unwrap().unwrap().is_err());
        assert!(matches!(node.claim(KEY), Claim::Vacant(_)));
    }

    #[test]
    fn released_slots_are_not_refilled_by_stale_owners() {
        let node = node();
        let Claim::Vacant(stale) = node.claim(KEY) else {
            panic!("first claim must own the slot");
        };
        assert_eq!(node.release(KEY.context), 1);
        let Claim::Vacant(fresh) = node.claim(KEY) else {
            panic!("released slot must be free");
        };

        node.publish(KEY, stale, Ok(Instance::new(3_u8))).unwrap();
        assert!(matches!(node.claim(KEY), Claim::Pending(_)));

        node.abandon(KEY, fresh);
        assert!(matches!(node.claim(KEY), Claim::Vacant(_)));
    }

    #[test]
    fn invalidate_only_drops_the_given_instance() {
        let node = node();
        let Claim::Vacant(generation) = node.claim(KEY) else {
            panic!("first claim must own the slot");
        };
        let cached = node
            .publish(KEY, generation, Ok(Instance::new(4_u8)))
            .unwrap();

        assert!(!node.invalidate(KEY, &Instance::new(4_u8)));
        assert_eq!(node.instance_count(), 1);

        assert!(node.invalidate(KEY, &cached));
        assert!(matches!(node.claim(KEY), Claim::Vacant(_)));
    }
}
