use std::sync::Arc;
use std::time::Instant;

use crate::entry::DirContent;

/// Stable index of a node in the recency list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Sentinel before the most recently used node
    pub const HEAD: NodeId = NodeId(0);
    /// Sentinel after the least recently used node
    pub const TAIL: NodeId = NodeId(1);

    pub fn index(&self) -> usize {
        self.0
    }

    fn is_sentinel(&self) -> bool {
        *self == Self::HEAD || *self == Self::TAIL
    }
}

/// A slot in the recency list. Sentinels and freed slots carry no content.
#[derive(Debug)]
pub struct LruNode {
    pub content: Option<Arc<DirContent>>,
    pub expires_at: Instant,
    pub dirty: bool,
    prev: NodeId,
    next: NodeId,
}

impl LruNode {
    fn vacant(now: Instant) -> Self {
        Self {
            content: None,
            expires_at: now,
            dirty: false,
            prev: NodeId::HEAD,
            next: NodeId::TAIL,
        }
    }

    pub fn weight(&self) -> u64 {
        self.content.as_ref().map_or(0, |c| c.weight)
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        self.dirty || now > self.expires_at
    }
}

/// Arena-allocated doubly linked list ordering cache entries by recency.
///
/// Links are `NodeId`s into `nodes`; removed slots go on a free list and
/// are reused by later inserts.
#[derive(Debug)]
pub struct LruList {
    nodes: Vec<LruNode>,
    free: Vec<NodeId>,
    len: usize,
}

impl LruList {
    pub fn new() -> Self {
        let now = Instant::now();
        let mut head = LruNode::vacant(now);
        let mut tail = LruNode::vacant(now);
        head.next = NodeId::TAIL;
        tail.prev = NodeId::HEAD;

        Self {
            nodes: vec![head, tail],
            free: Vec::new(),
            len: 0,
        }
    }

    /// Insert content as the most recently used node and return its ID
    pub fn push_front(&mut self, content: Arc<DirContent>, expires_at: Instant) -> NodeId {
        let node = LruNode {
            content: Some(content),
            expires_at,
            dirty: false,
            prev: NodeId::HEAD,
            next: NodeId::HEAD,
        };

        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        };

        self.link_front(id);
        self.len += 1;
        id
    }

    /// Unlink a node and release its slot, returning the node's content
    pub fn remove(&mut self, id: NodeId) -> Option<Arc<DirContent>> {
        if id.is_sentinel() || self.nodes.get(id.index())?.content.is_none() {
            return None;
        }

        self.unlink(id);
        self.len -= 1;
        self.free.push(id);
        self.nodes[id.index()].content.take()
    }

    /// Mark a node as most recently used
    pub fn move_to_front(&mut self, id: NodeId) {
        if id.is_sentinel() || self.nodes[NodeId::HEAD.index()].next == id {
            return;
        }
        self.unlink(id);
        self.link_front(id);
    }

    /// Least recently used node, if any
    pub fn back(&self) -> Option<NodeId> {
        let id = self.nodes[NodeId::TAIL.index()].prev;
        (id != NodeId::HEAD).then_some(id)
    }

    /// Get a reference to a live node
    pub fn get(&self, id: NodeId) -> Option<&LruNode> {
        self.nodes.get(id.index()).filter(|n| n.content.is_some())
    }

    /// Get a mutable reference to a live node
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut LruNode> {
        self.nodes.get_mut(id.index()).filter(|n| n.content.is_some())
    }

    /// Number of live nodes (sentinels excluded)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Walk from the most recently used node toward the least
    pub fn iter_front(&self) -> impl Iterator<Item = (NodeId, &LruNode)> {
        self.walk(NodeId::HEAD, |n| n.next, NodeId::TAIL)
    }

    /// Walk from the least recently used node toward the most
    pub fn iter_back(&self) -> impl Iterator<Item = (NodeId, &LruNode)> {
        self.walk(NodeId::TAIL, |n| n.prev, NodeId::HEAD)
    }

    fn walk(
        &self,
        start: NodeId,
        step: fn(&LruNode) -> NodeId,
        end: NodeId,
    ) -> impl Iterator<Item = (NodeId, &LruNode)> {
        let mut current = step(&self.nodes[start.index()]);
        // Bounded by the arena size so a corrupted list cannot loop forever
        let mut remaining = self.nodes.len();
        std::iter::from_fn(move || {
            if current == end || remaining == 0 {
                return None;
            }
            remaining -= 1;
            let id = current;
            let node = &self.nodes[id.index()];
            current = step(node);
            Some((id, node))
        })
    }

    fn link_front(&mut self, id: NodeId) {
        let first = self.nodes[NodeId::HEAD.index()].next;
        self.nodes[id.index()].prev = NodeId::HEAD;
        self.nodes[id.index()].next = first;
        self.nodes[first.index()].prev = id;
        self.nodes[NodeId::HEAD.index()].next = id;
    }

    fn unlink(&mut self, id: NodeId) {
        let LruNode { prev, next, .. } = self.nodes[id.index()];
        self.nodes[prev.index()].next = next;
        self.nodes[next.index()].prev = prev;
    }
}

impl Default for LruList {
    fn default() -> Self {
        Self::new()
    }
}
