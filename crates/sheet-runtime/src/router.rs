#![forbid(unsafe_code)]

//! Content router: keeps embedded content in whichever container is live.
//!
//! Children are tracked in logical order. While the sheet is hidden they live
//! in the staging container; while it is shown they live in the presentation
//! container. Retargeting relocates every child (remove, then insert the same
//! identity) and never recreates one.
//!
//! # Invariants
//!
//! 1. A child appears at most once, in exactly the current target container.
//! 2. `attach` of a child already at the requested position is a no-op.
//! 3. `detach` of an unknown child is a no-op.
//! 4. Retargeting to the current target is a no-op.
//!
//! All operations return the physical [`ContentOp`]s to perform, in order.

use crate::host::ContainerKind;

/// One physical content mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOp<K> {
    Insert {
        container: ContainerKind,
        child: K,
        index: usize,
    },
    Remove {
        container: ContainerKind,
        child: K,
    },
}

/// Tracks where content children live.
#[derive(Debug, Clone)]
pub struct ContentRouter<K> {
    target: ContainerKind,
    children: Vec<K>,
}

impl<K> Default for ContentRouter<K> {
    fn default() -> Self {
        Self {
            target: ContainerKind::Staging,
            children: Vec::new(),
        }
    }
}

impl<K: Copy + Eq> ContentRouter<K> {
    /// Empty router targeting the staging container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Container children are currently routed into.
    #[inline]
    #[must_use]
    pub fn target(&self) -> ContainerKind {
        self.target
    }

    /// Children in logical order.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[K] {
        &self.children
    }

    /// Whether `child` is attached.
    #[must_use]
    pub fn contains(&self, child: K) -> bool {
        self.children.contains(&child)
    }

    /// Attach `child` at `index` (clamped to the end).
    ///
    /// Re-attaching a known child at a new index moves it.
    pub fn attach(&mut self, child: K, index: usize) -> Vec<ContentOp<K>> {
        let container = self.target;
        let mut ops = Vec::with_capacity(2);
        if let Some(current) = self.children.iter().position(|c| *c == child) {
            let wanted = index.min(self.children.len() - 1);
            if current == wanted {
                return ops;
            }
            self.children.remove(current);
            ops.push(ContentOp::Remove { container, child });
        }
        let index = index.min(self.children.len());
        self.children.insert(index, child);
        ops.push(ContentOp::Insert {
            container,
            child,
            index,
        });
        ops
    }

    /// Detach `child` if present.
    pub fn detach(&mut self, child: K) -> Vec<ContentOp<K>> {
        match self.children.iter().position(|c| *c == child) {
            Some(index) => {
                self.children.remove(index);
                vec![ContentOp::Remove {
                    container: self.target,
                    child,
                }]
            }
            None => Vec::new(),
        }
    }

    /// Relocate every child into `target`, preserving order and identity.
    pub fn retarget(&mut self, target: ContainerKind) -> Vec<ContentOp<K>> {
        if self.target == target {
            return Vec::new();
        }
        let from = self.target;
        self.target = target;
        let mut ops = Vec::with_capacity(self.children.len() * 2);
        ops.extend(self.children.iter().map(|&child| ContentOp::Remove {
            container: from,
            child,
        }));
        ops.extend(
            self.children
                .iter()
                .enumerate()
                .map(|(index, &child)| ContentOp::Insert {
                    container: target,
                    child,
                    index,
                }),
        );
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_is_idempotent() {
        let mut router = ContentRouter::new();
        assert_eq!(router.attach(1u32, 0).len(), 1);
        assert!(router.attach(1, 0).is_empty());
        assert!(router.attach(1, 9).is_empty(), "clamped to the same slot");
        assert_eq!(router.children(), &[1]);
    }

    #[test]
    fn attach_clamps_and_orders() {
        let mut router = ContentRouter::new();
        router.attach(1u32, 0);
        router.attach(2, 10);
        router.attach(3, 1);
        assert_eq!(router.children(), &[1, 3, 2]);
    }

    #[test]
    fn reattach_moves_child() {
        let mut router = ContentRouter::new();
        router.attach(1u32, 0);
        router.attach(2, 1);
        let ops = router.attach(1, 1);
        assert_eq!(
            ops,
            vec![
                ContentOp::Remove {
                    container: ContainerKind::Staging,
                    child: 1
                },
                ContentOp::Insert {
                    container: ContainerKind::Staging,
                    child: 1,
                    index: 1
                },
            ]
        );
        assert_eq!(router.children(), &[2, 1]);
    }

    #[test]
    fn detach_unknown_is_noop() {
        let mut router = ContentRouter::<u32>::new();
        assert!(router.detach(7).is_empty());
        router.attach(7, 0);
        assert_eq!(router.detach(7).len(), 1);
        assert!(router.detach(7).is_empty());
    }

    #[test]
    fn retarget_relocates_without_recreating() {
        let mut router = ContentRouter::new();
        router.attach(1u32, 0);
        router.attach(2, 1);
        let ops = router.retarget(ContainerKind::Presentation);
        assert_eq!(
            ops,
            vec![
                ContentOp::Remove {
                    container: ContainerKind::Staging,
                    child: 1
                },
                ContentOp::Remove {
                    container: ContainerKind::Staging,
                    child: 2
                },
                ContentOp::Insert {
                    container: ContainerKind::Presentation,
                    child: 1,
                    index: 0
                },
                ContentOp::Insert {
                    container: ContainerKind::Presentation,
                    child: 2,
                    index: 1
                },
            ]
        );
        assert!(router.retarget(ContainerKind::Presentation).is_empty());
        assert_eq!(router.target(), ContainerKind::Presentation);
    }

    #[test]
    fn attach_routes_into_current_target() {
        let mut router = ContentRouter::new();
        router.retarget(ContainerKind::Presentation);
        let ops = router.attach(5u32, 0);
        assert_eq!(
            ops,
            vec![ContentOp::Insert {
                container: ContainerKind::Presentation,
                child: 5,
                index: 0
            }]
        );
    }

    mod replay {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Step {
            Attach(u8, usize),
            Detach(u8),
            Show(bool),
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                (0u8..5, 0usize..6).prop_map(|(c, i)| Step::Attach(c, i)),
                (0u8..5).prop_map(Step::Detach),
                any::<bool>().prop_map(Step::Show),
            ]
        }

        fn container<'a>(
            staging: &'a mut Vec<u8>,
            shown: &'a mut Vec<u8>,
            kind: ContainerKind,
        ) -> &'a mut Vec<u8> {
            match kind {
                ContainerKind::Staging => staging,
                ContainerKind::Presentation => shown,
            }
        }

        proptest! {
            #[test]
            fn replayed_ops_mirror_router(steps in prop::collection::vec(step(), 0..40)) {
                let mut router = ContentRouter::new();
                let (mut staging, mut shown) = (Vec::new(), Vec::new());
                for step in steps {
                    let ops = match step {
                        Step::Attach(c, i) => router.attach(c, i),
                        Step::Detach(c) => router.detach(c),
                        Step::Show(true) => router.retarget(ContainerKind::Presentation),
                        Step::Show(false) => router.retarget(ContainerKind::Staging),
                    };
                    for op in ops {
                        match op {
                            ContentOp::Insert { container: kind, child, index } => {
                                let list = container(&mut staging, &mut shown, kind);
                                prop_assert!(!list.contains(&child), "child {} inserted twice", child);
                                prop_assert!(index <= list.len());
                                list.insert(index, child);
                            }
                            ContentOp::Remove { container: kind, child } => {
                                let list = container(&mut staging, &mut shown, kind);
                                let at = list.iter().position(|c| *c == child);
                                prop_assert!(at.is_some(), "child {} removed but absent", child);
                                if let Some(at) = at {
                                    list.remove(at);
                                }
                            }
                        }
                    }
                    let (live, idle) = match router.target() {
                        ContainerKind::Staging => (&staging, &shown),
                        ContainerKind::Presentation => (&shown, &staging),
                    };
                    prop_assert_eq!(live.as_slice(), router.children());
                    prop_assert!(idle.is_empty());
                }
            }
        }
    }
}
