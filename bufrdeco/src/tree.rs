//! Expanded descriptor tree of one message.
//!
//! Nodes live in an arena and refer to each other by index. The tree is built
//! once from the section 3 list and Table D, and is read-only afterwards.

use crate::errors::{Error, Result};
use crate::structs::MAX_DESCRIPTORS;
use std::fmt::{Display, Write};
use std::ops::Range;
use tablelib::tables::{TableB, TableD};
use tablelib::{DescriptorKind, FXY};

pub type NodeId = usize;

pub const MAX_NODES: usize = 4096;

const ROOT_KEY: FXY = FXY::new(0, 0, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Fixed(usize),
    /// Factor read from the data, the descriptor after the replicator.
    Delayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replication {
    /// Number of descriptors replicated, not counting a delayed factor.
    pub span: usize,
    pub count: Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Element,
    Replicator(Replication),
    Operator,
    Sequence(NodeId),
}

#[derive(Debug, Clone)]
pub struct SequenceNode {
    pub key: FXY,
    pub parent: Option<NodeId>,
    pub level: usize,
    pub descriptors: Vec<FXY>,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone)]
pub struct SequenceTree {
    nodes: Vec<SequenceNode>,
    compressed: bool,
}

/// Callbacks of the depth-first walk.
pub trait Visitor {
    fn element(&mut self, fxy: &FXY) -> Result<()>;

    fn operator(&mut self, fxy: &FXY) -> Result<()>;

    /// Read the factor of a delayed replication.
    fn delayed_count(&mut self, replicator: &FXY, factor: &FXY) -> Result<usize>;

    /// How many times to walk a replicated body.
    fn replicate(&mut self, _replicator: &FXY, count: usize) -> Result<usize> {
        Ok(count)
    }

    fn end_replication(&mut self, _replicator: &FXY) {}

    fn enter_sequence(&mut self, _key: &FXY, _level: usize) {}

    fn leave_sequence(&mut self, _key: &FXY) {}
}

impl SequenceTree {
    pub fn build(descriptors: &[FXY], table_d: &TableD, compressed: bool) -> Result<Self> {
        let mut tree = SequenceTree {
            nodes: Vec::new(),
            compressed,
        };
        tree.push_node(ROOT_KEY, None, 0, descriptors.to_vec())?;

        // Worklist instead of recursion: a cyclic Table D must hit the node
        // cap, not the stack.
        let mut pending = vec![0];
        while let Some(id) = pending.pop() {
            let level = tree.nodes[id].level;
            let descriptors = tree.nodes[id].descriptors.clone();

            let mut slots = Vec::with_capacity(descriptors.len());
            for (i, fxy) in descriptors.iter().enumerate() {
                let slot = match fxy.kind() {
                    DescriptorKind::Element => Slot::Element,
                    DescriptorKind::Operator => Slot::Operator,
                    DescriptorKind::Replicator => {
                        Slot::Replicator(tree.replication(fxy, &descriptors[i + 1..], level)?)
                    }
                    DescriptorKind::Sequence => {
                        let entry = table_d
                            .lookup(fxy)
                            .ok_or(Error::UnknownSequence(*fxy))?;
                        let child = tree.push_node(*fxy, Some(id), level + 1, entry.chain)?;
                        pending.push(child);
                        Slot::Sequence(child)
                    }
                };
                slots.push(slot);
            }
            tree.nodes[id].slots = slots;
        }

        Ok(tree)
    }

    fn push_node(
        &mut self,
        key: FXY,
        parent: Option<NodeId>,
        level: usize,
        descriptors: Vec<FXY>,
    ) -> Result<NodeId> {
        if self.nodes.len() >= MAX_NODES {
            return Err(Error::TooManyNodes(MAX_NODES));
        }
        if descriptors.len() > MAX_DESCRIPTORS {
            return Err(Error::TooManyDescriptors(key, descriptors.len()));
        }

        let id = self.nodes.len();
        self.nodes.push(SequenceNode {
            key,
            parent,
            level,
            slots: Vec::with_capacity(descriptors.len()),
            descriptors,
        });
        Ok(id)
    }

    fn replication(&self, replicator: &FXY, following: &[FXY], level: usize) -> Result<Replication> {
        let span = replicator.x as usize;

        if replicator.y != 0 {
            if following.len() < span {
                return Err(Error::ReplicationOutOfRange {
                    replicator: *replicator,
                    span,
                    available: following.len(),
                });
            }
            return Ok(Replication {
                span,
                count: Count::Fixed(replicator.y as usize),
            });
        }

        if self.compressed && level > 0 {
            return Err(Error::DelayedReplicationInCompressed(*replicator));
        }

        match following.first() {
            Some(factor) if factor.f == 0 && factor.x == 31 => {}
            other => {
                return Err(Error::BadReplicationFactor(
                    *replicator,
                    format!(
                        "expected a class 31 factor descriptor, found {}",
                        other.map(|f| f.to_string()).unwrap_or_else(|| "nothing".into())
                    ),
                ));
            }
        }

        if following.len() < span + 1 {
            return Err(Error::ReplicationOutOfRange {
                replicator: *replicator,
                span,
                available: following.len().saturating_sub(1),
            });
        }

        Ok(Replication {
            span,
            count: Count::Delayed,
        })
    }

    pub fn root(&self) -> &SequenceNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> Option<&SequenceNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[SequenceNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Depth-first walk over the whole expansion, replications included.
    pub fn walk<V: Visitor>(&self, visitor: &mut V) -> Result<()> {
        let root = self.root();
        self.walk_range(0, 0..root.descriptors.len(), visitor)
    }

    fn walk_range<V: Visitor>(&self, id: NodeId, range: Range<usize>, visitor: &mut V) -> Result<()> {
        let node = &self.nodes[id];
        let mut i = range.start;

        while i < range.end {
            let fxy = &node.descriptors[i];

            match node.slots[i] {
                Slot::Element => {
                    visitor.element(fxy)?;
                    i += 1;
                }
                Slot::Operator => {
                    visitor.operator(fxy)?;
                    i += 1;
                }
                Slot::Sequence(child) => {
                    let child_node = &self.nodes[child];
                    visitor.enter_sequence(fxy, child_node.level);
                    self.walk_range(child, 0..child_node.descriptors.len(), visitor)?;
                    visitor.leave_sequence(fxy);
                    i += 1;
                }
                Slot::Replicator(rep) => {
                    let (count, body_start) = match rep.count {
                        Count::Fixed(n) => (n, i + 1),
                        Count::Delayed => {
                            let factor = &node.descriptors[i + 1];
                            (visitor.delayed_count(fxy, factor)?, i + 2)
                        }
                    };
                    let body = body_start..body_start + rep.span;

                    let times = visitor.replicate(fxy, count)?;
                    for _ in 0..times {
                        self.walk_range(id, body.clone(), visitor)?;
                    }
                    visitor.end_replication(fxy);
                    i = body.end;
                }
            }
        }

        Ok(())
    }

    /// Indented listing of the expansion, with element names when Table B is
    /// given. Replicated bodies are listed once.
    pub fn listing(&self, table_b: Option<&TableB>) -> String {
        let mut printer = TreePrinter {
            out: String::new(),
            depth: 1,
            table_b,
        };
        // The printer never fails.
        let _ = self.walk(&mut printer);
        printer.out
    }
}

impl Display for SequenceTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", ROOT_KEY)?;
        write!(f, "{}", self.listing(None))
    }
}

struct TreePrinter<'a> {
    out: String,
    depth: usize,
    table_b: Option<&'a TableB>,
}

impl TreePrinter<'_> {
    fn line(&mut self, fxy: &FXY, note: &str) {
        let _ = writeln!(self.out, "{}{} {}", "  ".repeat(self.depth), fxy, note);
    }
}

impl Visitor for TreePrinter<'_> {
    fn element(&mut self, fxy: &FXY) -> Result<()> {
        let name = self
            .table_b
            .and_then(|b| b.lookup(fxy))
            .map(|e| e.name)
            .unwrap_or_default();
        self.line(fxy, &name);
        Ok(())
    }

    fn operator(&mut self, fxy: &FXY) -> Result<()> {
        self.line(fxy, "operator");
        Ok(())
    }

    fn delayed_count(&mut self, replicator: &FXY, factor: &FXY) -> Result<usize> {
        self.line(replicator, &format!("delayed replication, factor {}", factor));
        Ok(1)
    }

    fn replicate(&mut self, replicator: &FXY, count: usize) -> Result<usize> {
        if replicator.y != 0 {
            self.line(replicator, &format!("replication x{}", count));
        }
        self.depth += 1;
        Ok(count.min(1))
    }

    fn end_replication(&mut self, _replicator: &FXY) {
        self.depth -= 1;
    }

    fn enter_sequence(&mut self, key: &FXY, _level: usize) {
        self.line(key, "sequence");
        self.depth += 1;
    }

    fn leave_sequence(&mut self, _key: &FXY) {
        self.depth -= 1;
    }
}
