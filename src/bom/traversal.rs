//! BOM Traversal
//!
//! Breadth-first walk over parent/child links, level by level:
//! - each level's frontier is a set, so a link is yielded at most once per depth
//! - links of a level are yielded in creation order
//! - `as_of` selects the links valid at that instant instead of the active ones
//! - `official_only` drops links whose far end was not official and does not
//!   expand below it
//!
//! The walk is lazy: the next level is only read from the catalog once the
//! current one has been consumed.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{Catalog, ObjectId, ParentChildLink};

/// Which end of a link the walk follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    Children,
    Parents,
}

/// Bounds of a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalOptions {
    /// `-1` walks to the leaves, `1` stops at the first level.
    pub max_depth: i32,
    /// `None` means the currently active links.
    pub as_of: Option<DateTime<Utc>>,
    pub official_only: bool,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_depth: -1,
            as_of: None,
            official_only: false,
        }
    }
}

impl TraversalOptions {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn depth(mut self, max_depth: i32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn as_of(mut self, instant: DateTime<Utc>) -> Self {
        self.as_of = Some(instant);
        self
    }

    pub fn official_only(mut self) -> Self {
        self.official_only = true;
        self
    }

    fn allows(&self, depth: u32) -> bool {
        self.max_depth < 0 || depth <= self.max_depth as u32
    }
}

/// One yielded link and its distance from the root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BomEntry {
    pub depth: u32,
    /// The far end of the link: the child when walking down, the parent
    /// when walking up.
    pub node: ObjectId,
    pub link: ParentChildLink,
}

/// Lazy breadth-first iterator over BOM links.
pub struct BomTraversal<'a> {
    catalog: &'a Catalog,
    direction: TraversalDirection,
    options: TraversalOptions,
    depth: u32,
    frontier: BTreeSet<ObjectId>,
    pending: VecDeque<BomEntry>,
}

impl<'a> BomTraversal<'a> {
    pub fn new(
        catalog: &'a Catalog,
        root: ObjectId,
        direction: TraversalDirection,
        options: TraversalOptions,
    ) -> Self {
        Self {
            catalog,
            direction,
            options,
            depth: 0,
            frontier: BTreeSet::from([root]),
            pending: VecDeque::new(),
        }
    }

    pub fn children(catalog: &'a Catalog, root: ObjectId, options: TraversalOptions) -> Self {
        Self::new(catalog, root, TraversalDirection::Children, options)
    }

    pub fn parents(catalog: &'a Catalog, root: ObjectId, options: TraversalOptions) -> Self {
        Self::new(catalog, root, TraversalDirection::Parents, options)
    }

    fn far_end(&self, link: &ParentChildLink) -> ObjectId {
        match self.direction {
            TraversalDirection::Children => link.child,
            TraversalDirection::Parents => link.parent,
        }
    }

    fn links_of(&self, node: ObjectId) -> Vec<&'a ParentChildLink> {
        let catalog: &'a Catalog = self.catalog;
        match self.direction {
            TraversalDirection::Children => catalog.child_links(node, self.options.as_of).collect(),
            TraversalDirection::Parents => catalog.parent_links(node, self.options.as_of).collect(),
        }
    }

    fn keeps(&self, node: ObjectId) -> bool {
        !self.options.official_only
            || self
                .catalog
                .is_official(node, self.options.as_of)
                .unwrap_or(false)
    }

    /// Read the next level into `pending`. Returns false once exhausted.
    fn advance_level(&mut self) -> bool {
        let depth = self.depth + 1;
        // Acyclic graphs never get deeper than the number of objects.
        let limit = self.catalog.objects().count() as u32;
        if self.frontier.is_empty() || !self.options.allows(depth) || depth > limit {
            self.frontier.clear();
            return false;
        }

        let mut links: Vec<&'a ParentChildLink> = self
            .frontier
            .iter()
            .flat_map(|node| self.links_of(*node))
            .collect();
        links.sort_by_key(|link| link.id);

        let mut next_frontier = BTreeSet::new();
        for link in links {
            let node = self.far_end(link);
            if !self.keeps(node) {
                continue;
            }
            next_frontier.insert(node);
            self.pending.push_back(BomEntry {
                depth,
                node,
                link: link.clone(),
            });
        }

        self.depth = depth;
        self.frontier = next_frontier;
        true
    }
}

impl Iterator for BomTraversal<'_> {
    type Item = BomEntry;

    fn next(&mut self) -> Option<BomEntry> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(entry);
            }
            if !self.advance_level() {
                return None;
            }
        }
    }
}

/// Entries at the greatest depth.
pub fn last_level(entries: &[BomEntry]) -> Vec<&BomEntry> {
    let deepest = entries.iter().map(|e| e.depth).max();
    entries
        .iter()
        .filter(|e| Some(e.depth) == deepest)
        .collect()
}

/// Distinct far ends, in first-seen order.
pub fn distinct_nodes(entries: &[BomEntry]) -> Vec<ObjectId> {
    let mut seen = BTreeSet::new();
    entries
        .iter()
        .filter(|e| seen.insert(e.node))
        .map(|e| e.node)
        .collect()
}
