//! Spanning-tree encoding of the current simplex basis.
//!
//! Every node carries its parent, the basis arc to the parent (with
//! direction), its depth, its successor in a circular pre-order thread,
//! the predecessor of that thread, the last node of its subtree in thread
//! order, and its dual potential. Arcs carry flow and a bound state. The
//! thread/depth/last_succ triple makes subtree enumeration and the
//! post-pivot splice proportional to the moved subtree, not the whole
//! tree.

use std::collections::HashMap;

use crate::graph::FullBipartiteDigraph;
use crate::{E, I};

const INVALID: I = I::MAX;

/// Position of an arc relative to its bounds.
///
/// The discriminants are the multipliers of the reduced-cost eligibility
/// test: an arc can enter the basis when `sign * reduced_cost < -eps`.
/// `Upper` is unreachable for the uncapacitated real arcs solved here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ArcState {
    Upper = -1,
    Basis = 0,
    Lower = 1,
}

impl ArcState {
    #[inline]
    pub fn sign(self) -> E {
        self as i8 as E
    }
}

/// The basis tree of the network simplex, rooted at the auxiliary node.
pub struct SpanningTree {
    root: I,
    parent: Vec<I>,
    pred: Vec<I>,
    /// Whether the pred arc is directed node -> parent.
    forward: Vec<bool>,
    depth: Vec<I>,
    thread: Vec<I>,
    rev_thread: Vec<I>,
    last_succ: Vec<I>,
    potential: Vec<E>,

    flow: Vec<E>,
    state: Vec<ArcState>,
}

impl SpanningTree {
    /// Builds the all-artificial starting basis.
    ///
    /// `supply` holds the signed weight of every non-root node: positive
    /// for supplies, negative for demands (sinks). Each node hangs off
    /// the root through its artificial arc, which carries the node's
    /// weight; potentials are set so every artificial arc is dual
    /// feasible (`pi(root) = 0`, supplies at `-M`, demands at `+M`).
    pub fn new(di: &FullBipartiteDigraph, supply: &[E], big_m: E) -> Self {
        let nodes = di.node_count();
        let arcs = di.arc_count();
        let root = di.root();

        let mut tree = Self {
            root,
            parent: vec![INVALID; nodes],
            pred: vec![INVALID; nodes],
            forward: vec![false; nodes],
            depth: vec![1; nodes],
            thread: vec![INVALID; nodes],
            rev_thread: vec![INVALID; nodes],
            last_succ: vec![INVALID; nodes],
            potential: vec![0.; nodes],
            flow: vec![0.; arcs],
            state: vec![ArcState::Lower; arcs],
        };

        tree.depth[root] = 0;
        tree.last_succ[root] = if root > 0 { root - 1 } else { root };
        tree.thread[root] = if root > 0 { 0 } else { root };
        tree.rev_thread[root] = tree.last_succ[root];

        for v in 0..root {
            let arc = di.artificial_arc_id(v);
            tree.parent[v] = root;
            tree.pred[v] = arc;
            tree.last_succ[v] = v;
            tree.thread[v] = if v + 1 < root { v + 1 } else { root };
            tree.rev_thread[v] = if v > 0 { v - 1 } else { root };
            tree.state[arc] = ArcState::Basis;

            if supply[v] >= 0. {
                // Supply node: artificial arc v -> root carries its weight
                tree.forward[v] = true;
                tree.flow[arc] = supply[v];
                tree.potential[v] = -big_m;
            } else {
                // Demand node: root -> v
                tree.forward[v] = false;
                tree.flow[arc] = -supply[v];
                tree.potential[v] = big_m;
            }
        }

        tree
    }

    #[inline]
    pub fn root(&self) -> I {
        self.root
    }

    #[inline]
    pub fn parent(&self, v: I) -> I {
        self.parent[v]
    }

    #[inline]
    pub fn pred(&self, v: I) -> I {
        self.pred[v]
    }

    /// Whether `v`'s basis arc is directed from `v` to its parent.
    #[inline]
    pub fn is_forward(&self, v: I) -> bool {
        self.forward[v]
    }

    #[inline]
    pub fn potential(&self, v: I) -> E {
        self.potential[v]
    }

    #[inline]
    pub fn flow(&self, arc: I) -> E {
        self.flow[arc]
    }

    #[inline]
    pub fn add_flow(&mut self, arc: I, delta: E) {
        self.flow[arc] += delta;
    }

    #[inline]
    pub fn state(&self, arc: I) -> ArcState {
        self.state[arc]
    }

    #[inline]
    pub fn set_state(&mut self, arc: I, state: ArcState) {
        self.state[arc] = state;
    }

    /// Lowest common ancestor of `u` and `v`: equalize depths, then walk
    /// both sides up in lock-step.
    pub fn find_join(&self, u: I, v: I) -> I {
        let (mut u, mut v) = (u, v);
        while self.depth[u] > self.depth[v] {
            u = self.parent[u];
        }
        while self.depth[v] > self.depth[u] {
            v = self.parent[v];
        }
        while u != v {
            u = self.parent[u];
            v = self.parent[v];
        }
        u
    }

    /// Nodes from `v` towards the root, excluding `join`.
    pub fn ancestors(&self, v: I, join: I) -> impl Iterator<Item = I> + '_ {
        let mut cur = v;
        std::iter::from_fn(move || {
            if cur == join {
                return None;
            }
            let node = cur;
            cur = self.parent[cur];
            Some(node)
        })
    }

    /// The subtree of `v` in thread (pre-order) order, `v` included.
    pub fn subtree(&self, v: I) -> impl Iterator<Item = I> + '_ {
        let last = self.last_succ[v];
        let mut next = Some(v);
        std::iter::from_fn(move || {
            let cur = next?;
            next = if cur == last {
                None
            } else {
                Some(self.thread[cur])
            };
            Some(cur)
        })
    }

    /// Replaces the basis arc above `out_node` with `in_arc`.
    ///
    /// The subtree rooted at `out_node` is detached, re-rooted at `q`
    /// (the endpoint of `in_arc` inside it) and spliced back under `p`
    /// (the other endpoint). `q_is_source` tells whether `in_arc` is
    /// directed `q -> p`. Work is proportional to the moved subtree plus
    /// the depth of the detach/splice points.
    pub fn update(&mut self, out_node: I, in_arc: I, p: I, q: I, q_is_source: bool) {
        let sub: Vec<I> = self.subtree(out_node).collect();

        // Unsplice the subtree from the circular thread and shorten the
        // ranges of every ancestor whose subtree ended inside it.
        let old_last = self.last_succ[out_node];
        let before = self.rev_thread[out_node];
        let after = self.thread[old_last];
        self.thread[before] = after;
        self.rev_thread[after] = before;
        let mut a = self.parent[out_node];
        loop {
            if self.last_succ[a] != old_last {
                break;
            }
            self.last_succ[a] = before;
            if a == self.root {
                break;
            }
            a = self.parent[a];
        }

        // Re-root the subtree at q by reversing the basis arcs on the
        // path q -> out_node.
        let mut x = q;
        let mut new_parent = p;
        let mut new_pred = in_arc;
        let mut new_forward = q_is_source;
        loop {
            let old_parent = self.parent[x];
            let old_pred = self.pred[x];
            let old_forward = self.forward[x];
            self.parent[x] = new_parent;
            self.pred[x] = new_pred;
            self.forward[x] = new_forward;
            if x == out_node {
                break;
            }
            new_parent = x;
            new_pred = old_pred;
            new_forward = !old_forward;
            x = old_parent;
        }

        // Child lists restricted to the moved nodes, in old thread order.
        let mut children: HashMap<I, Vec<I>> = HashMap::new();
        for &v in &sub {
            if v != q {
                children.entry(self.parent[v]).or_default().push(v);
            }
        }

        // Pre-order walk from q rebuilds depth, thread and last_succ of
        // the moved subtree.
        let mut order = Vec::with_capacity(sub.len());
        let mut stack = vec![q];
        self.depth[q] = self.depth[p] + 1;
        while let Some(v) = stack.pop() {
            if v != q {
                self.depth[v] = self.depth[self.parent[v]] + 1;
            }
            order.push(v);
            if let Some(ch) = children.get(&v) {
                for &c in ch.iter().rev() {
                    stack.push(c);
                }
            }
        }
        for k in 0..order.len() - 1 {
            self.thread[order[k]] = order[k + 1];
            self.rev_thread[order[k + 1]] = order[k];
        }
        for &v in order.iter().rev() {
            self.last_succ[v] = match children.get(&v) {
                Some(ch) => self.last_succ[*ch.last().unwrap()],
                None => v,
            };
        }

        // Splice the subtree back in right after p, extending the ranges
        // of the ancestors whose subtree ended at p.
        let first = q;
        let last = *order.last().unwrap();
        let succ = self.thread[p];
        self.thread[p] = first;
        self.rev_thread[first] = p;
        self.thread[last] = succ;
        self.rev_thread[succ] = last;
        let mut a = p;
        loop {
            if self.last_succ[a] != p {
                break;
            }
            self.last_succ[a] = last;
            if a == self.root {
                break;
            }
            a = self.parent[a];
        }
    }

    /// Adds `delta` to the potential of every node in `v`'s subtree.
    pub fn shift_potentials(&mut self, v: I, delta: E) {
        let last = self.last_succ[v];
        let mut x = v;
        loop {
            self.potential[x] += delta;
            if x == last {
                break;
            }
            x = self.thread[x];
        }
    }

    /// Structural self-check used by the test suite.
    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        let nodes = self.parent.len();

        // Thread is a single cycle visiting every node, starting and
        // ending at the root, and rev_thread inverts it.
        let mut seen = vec![false; nodes];
        let mut v = self.root;
        for _ in 0..nodes {
            assert!(!seen[v], "thread revisits node {}", v);
            seen[v] = true;
            assert_eq!(self.rev_thread[self.thread[v]], v);
            v = self.thread[v];
        }
        assert_eq!(v, self.root, "thread does not close at the root");

        for v in 0..nodes {
            if v == self.root {
                assert_eq!(self.depth[v], 0);
                continue;
            }
            // Parent relations
            let p = self.parent[v];
            assert_eq!(self.depth[v], self.depth[p] + 1);
            // Subtree of v is exactly the thread segment [v, last_succ]
            let sub: Vec<I> = self.subtree(v).collect();
            for &s in &sub {
                let mut a = s;
                while a != v {
                    a = self.parent[a];
                    assert_ne!(a, INVALID);
                }
            }
            let mut count = 0;
            for u in 0..nodes {
                if u == self.root {
                    continue;
                }
                let mut a = u;
                let mut inside = false;
                while a != self.root {
                    if a == v {
                        inside = true;
                        break;
                    }
                    a = self.parent[a];
                }
                if inside {
                    count += 1;
                    assert!(sub.contains(&u));
                }
            }
            assert_eq!(count, sub.len());
        }
    }
}
