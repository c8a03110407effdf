//! Persistent ordered set
//!
//! An AVL tree whose nodes are shared through `Arc`. Cloning a tree
//! copies one pointer; a write copies only the nodes on the path from
//! the root to the modified leaf (`Arc::make_mut`), so every clone keeps
//! seeing the contents it was cloned with.

use std::cmp::Ordering;
use std::ops::Bound;
use std::sync::Arc;

type Link<T> = Option<Arc<Node<T>>>;

#[derive(Clone)]
struct Node<T> {
    item: T,
    left: Link<T>,
    right: Link<T>,
    height: u8,
}

/// Ordered set with O(1) snapshots.
pub struct OrdTree<T> {
    root: Link<T>,
    len: usize,
}

impl<T> Clone for OrdTree<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
        }
    }
}

impl<T> Default for OrdTree<T> {
    fn default() -> Self {
        Self { root: None, len: 0 }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for OrdTree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T> OrdTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// In-order iterator over every item.
    pub fn iter(&self) -> Iter<'_, T> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        iter
    }

    /// True when both trees share the same root node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: Ord + Clone> OrdTree<T> {
    /// Returns the stored item equal to `probe`.
    pub fn get(&self, probe: &T) -> Option<&T> {
        let mut link = self.root.as_deref();
        while let Some(node) = link {
            match probe.cmp(&node.item) {
                Ordering::Less => link = node.left.as_deref(),
                Ordering::Greater => link = node.right.as_deref(),
                Ordering::Equal => return Some(&node.item),
            }
        }
        None
    }

    /// Inserts `item`, replacing and returning an equal item if present.
    pub fn insert(&mut self, item: T) -> Option<T> {
        let replaced = insert_at(&mut self.root, item);
        if replaced.is_none() {
            self.len += 1;
        }
        replaced
    }

    /// Removes and returns the item equal to `probe`.
    pub fn remove(&mut self, probe: &T) -> Option<T> {
        // Avoid copying the search path when there is nothing to remove.
        self.get(probe)?;
        let removed = remove_at(&mut self.root, probe);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// In-order iterator starting at the first item satisfying `lower`.
    pub fn range_from(&self, lower: Bound<&T>) -> Iter<'_, T> {
        let mut iter = Iter { stack: Vec::new() };
        let mut link = self.root.as_deref();
        while let Some(node) = link {
            let keep = match lower {
                Bound::Included(k) => node.item >= *k,
                Bound::Excluded(k) => node.item > *k,
                Bound::Unbounded => true,
            };
            if keep {
                iter.stack.push(node);
                link = node.left.as_deref();
            } else {
                link = node.right.as_deref();
            }
        }
        iter
    }
}

fn height<T>(link: &Link<T>) -> u8 {
    link.as_ref().map_or(0, |n| n.height)
}

fn fix_height<T>(node: &mut Node<T>) {
    node.height = 1 + height(&node.left).max(height(&node.right));
}

fn into_item<T: Clone>(node: Arc<Node<T>>) -> T {
    Arc::try_unwrap(node)
        .map(|n| n.item)
        .unwrap_or_else(|shared| shared.item.clone())
}

fn insert_at<T: Ord + Clone>(link: &mut Link<T>, item: T) -> Option<T> {
    let replaced = match link.as_mut() {
        None => {
            *link = Some(Arc::new(Node {
                item,
                left: None,
                right: None,
                height: 1,
            }));
            return None;
        }
        Some(arc) => {
            let node = Arc::make_mut(arc);
            match item.cmp(&node.item) {
                Ordering::Less => insert_at(&mut node.left, item),
                Ordering::Greater => insert_at(&mut node.right, item),
                Ordering::Equal => return Some(std::mem::replace(&mut node.item, item)),
            }
        }
    };
    rebalance(link);
    replaced
}

fn remove_at<T: Ord + Clone>(link: &mut Link<T>, probe: &T) -> Option<T> {
    let node = Arc::make_mut(link.as_mut()?);
    let removed = match probe.cmp(&node.item) {
        Ordering::Less => remove_at(&mut node.left, probe),
        Ordering::Greater => remove_at(&mut node.right, probe),
        Ordering::Equal => {
            if node.right.is_none() {
                let left = node.left.take();
                let old = std::mem::replace(link, left);
                return old.map(into_item);
            }
            let successor = remove_min(&mut node.right)?;
            Some(std::mem::replace(&mut node.item, successor))
        }
    };
    rebalance(link);
    removed
}

fn remove_min<T: Ord + Clone>(link: &mut Link<T>) -> Option<T> {
    let node = Arc::make_mut(link.as_mut()?);
    if node.left.is_some() {
        let min = remove_min(&mut node.left);
        rebalance(link);
        return min;
    }
    let right = node.right.take();
    let old = std::mem::replace(link, right);
    old.map(into_item)
}

fn rotate_right<T: Clone>(link: &mut Link<T>) {
    let Some(mut root_arc) = link.take() else {
        return;
    };
    let root = Arc::make_mut(&mut root_arc);
    let Some(mut left_arc) = root.left.take() else {
        *link = Some(root_arc);
        return;
    };
    let left = Arc::make_mut(&mut left_arc);
    root.left = left.right.take();
    fix_height(root);
    left.right = Some(root_arc);
    fix_height(left);
    *link = Some(left_arc);
}

fn rotate_left<T: Clone>(link: &mut Link<T>) {
    let Some(mut root_arc) = link.take() else {
        return;
    };
    let root = Arc::make_mut(&mut root_arc);
    let Some(mut right_arc) = root.right.take() else {
        *link = Some(root_arc);
        return;
    };
    let right = Arc::make_mut(&mut right_arc);
    root.right = right.left.take();
    fix_height(root);
    right.left = Some(root_arc);
    fix_height(right);
    *link = Some(right_arc);
}

fn rebalance<T: Clone>(link: &mut Link<T>) {
    let Some(arc) = link.as_mut() else {
        return;
    };
    let node = Arc::make_mut(arc);
    fix_height(node);
    let balance = i16::from(height(&node.left)) - i16::from(height(&node.right));
    if balance > 1 {
        let left_heavy_right = node
            .left
            .as_ref()
            .is_some_and(|l| height(&l.right) > height(&l.left));
        if left_heavy_right {
            rotate_left(&mut node.left);
        }
        rotate_right(link);
    } else if balance < -1 {
        let right_heavy_left = node
            .right
            .as_ref()
            .is_some_and(|r| height(&r.left) > height(&r.right));
        if right_heavy_left {
            rotate_right(&mut node.right);
        }
        rotate_left(link);
    }
}

/// In-order iterator over an [`OrdTree`].
pub struct Iter<'a, T> {
    stack: Vec<&'a Node<T>>,
}

impl<'a, T> Iter<'a, T> {
    fn push_left(&mut self, mut link: Option<&'a Node<T>>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = node.left.as_deref();
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some(&node.item)
    }
}
