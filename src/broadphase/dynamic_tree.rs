//! Dynamic AABB tree.
//!
//! A binary bounding-volume hierarchy over fattened leaf AABBs. Leaves are
//! inserted with a surface-area cost heuristic and the tree is kept balanced
//! with AVL-style rotations, so insert, remove and move are O(log n).
//!
//! Leaves store a fat AABB: the tight AABB grown by a fixed margin and
//! extended along the last displacement. A moving proxy is only reinserted
//! once its tight AABB escapes the fat one.

use glam::Vec2;

use crate::collision::aabb::{Aabb, RayCastInput};
use crate::math::cross_sv;

/// Index of a tree node. Proxy ids are leaf node indices.
pub type ProxyId = usize;

/// Null node sentinel.
pub const NULL_NODE: ProxyId = usize::MAX;

#[derive(Debug, Clone)]
struct TreeNode<T> {
    /// Fat AABB for leaves, union of children for internal nodes.
    aabb: Aabb,
    /// Present on leaves only.
    user_data: Option<T>,
    parent: ProxyId,
    child1: ProxyId,
    child2: ProxyId,
    /// Leaf = 0, free node = -1.
    height: i32,
    /// Set when the leaf was (re)inserted since the last pair update.
    moved: bool,
}

impl<T> TreeNode<T> {
    fn free() -> Self {
        Self {
            aabb: Aabb::default(),
            user_data: None,
            parent: NULL_NODE,
            child1: NULL_NODE,
            child2: NULL_NODE,
            height: -1,
            moved: false,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }
}

/// Dynamic AABB tree carrying a `T` per leaf.
#[derive(Debug, Clone)]
pub struct DynamicTree<T> {
    nodes: Vec<TreeNode<T>>,
    free_list: Vec<ProxyId>,
    root: ProxyId,
    proxy_count: usize,
    /// Fixed fattening margin on every side.
    pub aabb_extension: f32,
    /// Scale of the displacement-based predictive extension.
    pub aabb_multiplier: f32,
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new(0.1, 4.0)
    }
}

impl<T: Copy> DynamicTree<T> {
    pub fn new(aabb_extension: f32, aabb_multiplier: f32) -> Self {
        Self {
            nodes: Vec::with_capacity(16),
            free_list: Vec::new(),
            root: NULL_NODE,
            proxy_count: 0,
            aabb_extension,
            aabb_multiplier,
        }
    }

    /// Insert a leaf for a tight AABB; the stored AABB is fattened.
    pub fn create_proxy(&mut self, aabb: &Aabb, user_data: T) -> ProxyId {
        let proxy_id = self.allocate_node();

        let node = &mut self.nodes[proxy_id];
        node.aabb = aabb.expanded(self.aabb_extension);
        node.user_data = Some(user_data);
        node.height = 0;
        node.moved = true;

        self.insert_leaf(proxy_id);
        self.proxy_count += 1;
        proxy_id
    }

    pub fn destroy_proxy(&mut self, proxy_id: ProxyId) {
        debug_assert!(self.is_proxy(proxy_id));
        if !self.is_proxy(proxy_id) {
            return;
        }
        self.remove_leaf(proxy_id);
        self.free_node(proxy_id);
        self.proxy_count -= 1;
    }

    /// Move a proxy to a new tight AABB with a displacement hint.
    ///
    /// If the tight AABB is still inside the stored fat AABB nothing happens
    /// and `false` is returned. Otherwise the leaf is reinserted with a fresh
    /// fat AABB extended along `displacement`, and `true` is returned.
    pub fn move_proxy(&mut self, proxy_id: ProxyId, aabb: &Aabb, displacement: Vec2) -> bool {
        debug_assert!(self.is_proxy(proxy_id));
        if !self.is_proxy(proxy_id) {
            return false;
        }

        if self.nodes[proxy_id].aabb.contains(aabb) {
            return false;
        }

        // Extend the AABB along the predicted motion.
        let mut fat = aabb.expanded(self.aabb_extension);
        let d = self.aabb_multiplier * displacement;
        if d.x < 0.0 {
            fat.min.x += d.x;
        } else {
            fat.max.x += d.x;
        }
        if d.y < 0.0 {
            fat.min.y += d.y;
        } else {
            fat.max.y += d.y;
        }

        self.remove_leaf(proxy_id);
        self.nodes[proxy_id].aabb = fat;
        self.insert_leaf(proxy_id);
        self.nodes[proxy_id].moved = true;
        true
    }

    #[inline]
    fn is_proxy(&self, proxy_id: ProxyId) -> bool {
        self.nodes
            .get(proxy_id)
            .is_some_and(|n| n.height == 0 && n.is_leaf())
    }

    #[inline]
    pub fn user_data(&self, proxy_id: ProxyId) -> Option<T> {
        self.nodes.get(proxy_id).and_then(|n| n.user_data)
    }

    /// The stored (fat) AABB of a proxy.
    #[inline]
    pub fn fat_aabb(&self, proxy_id: ProxyId) -> Aabb {
        self.nodes[proxy_id].aabb
    }

    #[inline]
    pub fn was_moved(&self, proxy_id: ProxyId) -> bool {
        self.nodes[proxy_id].moved
    }

    /// Flag a proxy as moved. Returns false if it already was.
    #[inline]
    pub fn mark_moved(&mut self, proxy_id: ProxyId) -> bool {
        match self.nodes.get_mut(proxy_id) {
            Some(node) if !node.moved => {
                node.moved = true;
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn clear_moved(&mut self, proxy_id: ProxyId) {
        if let Some(node) = self.nodes.get_mut(proxy_id) {
            node.moved = false;
        }
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Visit every proxy whose fat AABB overlaps `aabb`.
    ///
    /// The callback returns whether to keep visiting; returning `false` stops
    /// the whole query.
    pub fn query<F>(&self, aabb: &Aabb, mut callback: F)
    where
        F: FnMut(ProxyId) -> bool,
    {
        let mut stack: Vec<ProxyId> = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id];
            if !node.aabb.overlaps(aabb) {
                continue;
            }

            if node.is_leaf() {
                if !callback(node_id) {
                    return;
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Cast a ray through the tree.
    ///
    /// The callback receives the (possibly clipped) ray and a proxy whose fat
    /// AABB the ray crosses, and returns the new max fraction:
    /// - `0` terminates the cast
    /// - a value in `(0, 1]` clips the ray to that fraction
    /// - a negative value ignores this proxy and continues unclipped
    pub fn ray_cast<F>(&self, input: &RayCastInput, mut callback: F)
    where
        F: FnMut(&RayCastInput, ProxyId) -> f32,
    {
        let p1 = input.p1;
        let p2 = input.p2;
        let r = (p2 - p1).normalize_or_zero();
        if r == Vec2::ZERO {
            return;
        }

        let v = cross_sv(1.0, r);
        let abs_v = v.abs();

        let mut max_fraction = input.max_fraction;

        let segment_aabb = |max_fraction: f32| {
            let t = p1 + max_fraction * (p2 - p1);
            Aabb::new(p1.min(t), p1.max(t))
        };
        let mut bounds = segment_aabb(max_fraction);

        let mut stack: Vec<ProxyId> = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id];
            if !node.aabb.overlaps(&bounds) {
                continue;
            }

            // Separating axis for segment: |dot(v, p1 - c)| > dot(|v|, h)
            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1,
                    p2,
                    max_fraction,
                };

                let value = callback(&sub_input, node_id);
                if value == 0.0 {
                    // Callback ended the cast.
                    return;
                }

                if value > 0.0 {
                    max_fraction = value;
                    bounds = segment_aabb(max_fraction);
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Height of the tree; a single leaf has height 0.
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root].height
        }
    }

    /// Largest height difference between the two children of any node.
    pub fn max_balance(&self) -> i32 {
        self.nodes
            .iter()
            .filter(|n| n.height > 1)
            .map(|n| (self.nodes[n.child2].height - self.nodes[n.child1].height).abs())
            .max()
            .unwrap_or(0)
    }

    /// Sum of all node perimeters over the root perimeter.
    pub fn area_ratio(&self) -> f32 {
        if self.root == NULL_NODE {
            return 0.0;
        }
        let root_area = self.nodes[self.root].aabb.perimeter();
        let total: f32 = self
            .nodes
            .iter()
            .filter(|n| n.height >= 0)
            .map(|n| n.aabb.perimeter())
            .sum();
        total / root_area
    }

    /// Check parent links, heights and AABB containment for the whole tree.
    pub fn validate(&self) -> bool {
        if self.root == NULL_NODE {
            return self.proxy_count == 0;
        }
        if self.nodes[self.root].parent != NULL_NODE {
            return false;
        }
        let mut leaves = 0;
        let ok = self.validate_node(self.root, &mut leaves);
        ok && leaves == self.proxy_count
            && self.free_list.len() + self.live_nodes() == self.nodes.len()
    }

    fn live_nodes(&self) -> usize {
        self.nodes.iter().filter(|n| n.height >= 0).count()
    }

    fn validate_node(&self, index: ProxyId, leaves: &mut usize) -> bool {
        let node = &self.nodes[index];
        if node.is_leaf() {
            *leaves += 1;
            return node.child2 == NULL_NODE && node.height == 0 && node.user_data.is_some();
        }

        let (c1, c2) = (node.child1, node.child2);
        if c1 >= self.nodes.len() || c2 >= self.nodes.len() {
            return false;
        }
        let (n1, n2) = (&self.nodes[c1], &self.nodes[c2]);

        let structure = n1.parent == index && n2.parent == index;
        let height = node.height == 1 + n1.height.max(n2.height);
        let contains = node.aabb.contains(&n1.aabb) && node.aabb.contains(&n2.aabb);

        structure
            && height
            && contains
            && self.validate_node(c1, leaves)
            && self.validate_node(c2, leaves)
    }

    fn allocate_node(&mut self) -> ProxyId {
        if let Some(id) = self.free_list.pop() {
            self.nodes[id] = TreeNode::free();
            self.nodes[id].height = 0;
            id
        } else {
            self.nodes.push(TreeNode::free());
            let id = self.nodes.len() - 1;
            self.nodes[id].height = 0;
            id
        }
    }

    fn free_node(&mut self, node_id: ProxyId) {
        self.nodes[node_id] = TreeNode::free();
        self.free_list.push(node_id);
    }

    fn insert_leaf(&mut self, leaf: ProxyId) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        // Descend toward the cheapest sibling.
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = self.root;
        while !self.nodes[index].is_leaf() {
            let node = &self.nodes[index];
            let child1 = node.child1;
            let child2 = node.child2;

            let area = node.aabb.perimeter();
            let combined_area = node.aabb.union(&leaf_aabb).perimeter();

            // Pair the leaf with this node directly.
            let cost = 2.0 * combined_area;

            // Lower bound for going one level deeper.
            let inheritance_cost = 2.0 * (combined_area - area);

            let descend_cost = |child: ProxyId| {
                let c = &self.nodes[child];
                let aabb = leaf_aabb.union(&c.aabb);
                if c.is_leaf() {
                    aabb.perimeter() + inheritance_cost
                } else {
                    aabb.perimeter() - c.aabb.perimeter() + inheritance_cost
                }
            };
            let cost1 = descend_cost(child1);
            let cost2 = descend_cost(child2);

            if cost < cost1 && cost < cost2 {
                break;
            }

            index = if cost1 < cost2 { child1 } else { child2 };
        }

        let sibling = index;

        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate_node();
        {
            let sibling_aabb = self.nodes[sibling].aabb;
            let sibling_height = self.nodes[sibling].height;
            let node = &mut self.nodes[new_parent];
            node.parent = old_parent;
            node.aabb = leaf_aabb.union(&sibling_aabb);
            node.height = sibling_height + 1;
            node.child1 = sibling;
            node.child2 = leaf;
        }

        if old_parent != NULL_NODE {
            // Sibling had a parent.
            if self.nodes[old_parent].child1 == sibling {
                self.nodes[old_parent].child1 = new_parent;
            } else {
                self.nodes[old_parent].child2 = new_parent;
            }
        } else {
            self.root = new_parent;
        }
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        // Refit ancestors.
        self.refit_from(self.nodes[leaf].parent);
    }

    fn remove_leaf(&mut self, leaf: ProxyId) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].child1 == leaf {
            self.nodes[parent].child2
        } else {
            self.nodes[parent].child1
        };

        if grand_parent != NULL_NODE {
            // Splice the sibling into the parent's slot.
            if self.nodes[grand_parent].child1 == parent {
                self.nodes[grand_parent].child1 = sibling;
            } else {
                self.nodes[grand_parent].child2 = sibling;
            }
            self.nodes[sibling].parent = grand_parent;
            self.free_node(parent);

            self.refit_from(grand_parent);
        } else {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(parent);
        }
        self.nodes[leaf].parent = NULL_NODE;
    }

    fn refit_from(&mut self, mut index: ProxyId) {
        while index != NULL_NODE {
            index = self.balance(index);

            let child1 = self.nodes[index].child1;
            let child2 = self.nodes[index].child2;
            debug_assert!(child1 != NULL_NODE && child2 != NULL_NODE);

            let height = 1 + self.nodes[child1].height.max(self.nodes[child2].height);
            let aabb = self.nodes[child1].aabb.union(&self.nodes[child2].aabb);
            let node = &mut self.nodes[index];
            node.height = height;
            node.aabb = aabb;

            index = node.parent;
        }
    }

    /// Rotate the subtree at `i_a` if it is imbalanced. Returns the new subtree root.
    fn balance(&mut self, i_a: ProxyId) -> ProxyId {
        if self.nodes[i_a].is_leaf() || self.nodes[i_a].height < 2 {
            return i_a;
        }

        let i_b = self.nodes[i_a].child1;
        let i_c = self.nodes[i_a].child2;

        let balance = self.nodes[i_c].height - self.nodes[i_b].height;

        if balance > 1 {
            self.rotate_up(i_a, i_c, i_b, true)
        } else if balance < -1 {
            self.rotate_up(i_a, i_b, i_c, false)
        } else {
            i_a
        }
    }

    /// Promote child `i_up` of `i_a` to the subtree root. `i_keep` is the
    /// other child of `i_a`; `up_was_child2` tells which slot `i_up` held.
    fn rotate_up(
        &mut self,
        i_a: ProxyId,
        i_up: ProxyId,
        i_keep: ProxyId,
        up_was_child2: bool,
    ) -> ProxyId {
        let i_f = self.nodes[i_up].child1;
        let i_g = self.nodes[i_up].child2;

        // Swap A and the promoted child.
        let a_parent = self.nodes[i_a].parent;
        self.nodes[i_up].child1 = i_a;
        self.nodes[i_up].parent = a_parent;
        self.nodes[i_a].parent = i_up;

        // Re-link the parent of A.
        if a_parent != NULL_NODE {
            if self.nodes[a_parent].child1 == i_a {
                self.nodes[a_parent].child1 = i_up;
            } else {
                self.nodes[a_parent].child2 = i_up;
            }
        } else {
            self.root = i_up;
        }

        // The taller grandchild stays with the promoted node, the shorter one moves under A.
        let (i_stay, i_move) = if self.nodes[i_f].height > self.nodes[i_g].height {
            (i_f, i_g)
        } else {
            (i_g, i_f)
        };

        self.nodes[i_up].child2 = i_stay;
        if up_was_child2 {
            self.nodes[i_a].child2 = i_move;
        } else {
            self.nodes[i_a].child1 = i_move;
        }
        self.nodes[i_move].parent = i_a;

        let a_aabb = self.nodes[i_keep].aabb.union(&self.nodes[i_move].aabb);
        let a_height = 1 + self.nodes[i_keep].height.max(self.nodes[i_move].height);
        self.nodes[i_a].aabb = a_aabb;
        self.nodes[i_a].height = a_height;

        let up_aabb = a_aabb.union(&self.nodes[i_stay].aabb);
        self.nodes[i_up].aabb = up_aabb;
        self.nodes[i_up].height = 1 + a_height.max(self.nodes[i_stay].height);

        i_up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lcg(u64);

    impl Lcg {
        fn next_f32(&mut self) -> f32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 40) as f32) / (1u64 << 24) as f32
        }

        fn range(&mut self, lo: f32, hi: f32) -> f32 {
            lo + (hi - lo) * self.next_f32()
        }

        fn aabb(&mut self) -> Aabb {
            let c = Vec2::new(self.range(-50.0, 50.0), self.range(-50.0, 50.0));
            let h = Vec2::new(self.range(0.1, 2.0), self.range(0.1, 2.0));
            Aabb::from_center(c, h)
        }
    }

    #[test]
    fn test_tree_insert_remove_validate() {
        let mut tree: DynamicTree<u32> = DynamicTree::default();
        let mut rng = Lcg(7);
        let mut proxies = Vec::new();
        for i in 0..100 {
            proxies.push(tree.create_proxy(&rng.aabb(), i));
            assert!(tree.validate());
        }
        assert_eq!(tree.proxy_count(), 100);

        for id in proxies.drain(..50) {
            tree.destroy_proxy(id);
            assert!(tree.validate());
        }
        assert_eq!(tree.proxy_count(), 50);
        assert!(tree.area_ratio() >= 1.0);
    }

    #[test]
    fn test_tree_containment_after_moves() {
        let mut tree: DynamicTree<usize> = DynamicTree::default();
        let mut rng = Lcg(42);
        let mut tight: Vec<Aabb> = (0..64).map(|_| rng.aabb()).collect();
        let ids: Vec<ProxyId> = tight
            .iter()
            .enumerate()
            .map(|(i, a)| tree.create_proxy(a, i))
            .collect();

        for _ in 0..20 {
            for (i, id) in ids.iter().enumerate() {
                let d = Vec2::new(rng.range(-1.0, 1.0), rng.range(-1.0, 1.0));
                tight[i] = Aabb::new(tight[i].min + d, tight[i].max + d);
                tree.move_proxy(*id, &tight[i], d);
            }
            assert!(tree.validate());
            for (i, id) in ids.iter().enumerate() {
                assert!(tree.fat_aabb(*id).contains(&tight[i]));
            }
        }
    }

    #[test]
    fn test_tree_move_is_lazy() {
        let mut tree: DynamicTree<u32> = DynamicTree::new(0.1, 4.0);
        let aabb = Aabb::new(Vec2::ZERO, Vec2::ONE);
        let id = tree.create_proxy(&aabb, 0);

        let nudged = Aabb::new(Vec2::splat(0.05), Vec2::splat(1.05));
        assert!(!tree.move_proxy(id, &nudged, Vec2::splat(0.05)));
        assert_eq!(tree.fat_aabb(id), aabb.expanded(0.1));

        let far = Aabb::new(Vec2::splat(2.0), Vec2::splat(3.0));
        assert!(tree.move_proxy(id, &far, Vec2::new(2.0, 0.0)));
        let fat = tree.fat_aabb(id);
        assert!(fat.contains(&far));
        // Predictive extension along +x only.
        assert!((fat.max.x - (3.0 + 0.1 + 8.0)).abs() < 1e-5);
        assert!((fat.min.x - (2.0 - 0.1)).abs() < 1e-5);
    }

    #[test]
    fn test_tree_query_matches_brute_force() {
        let mut tree: DynamicTree<usize> = DynamicTree::default();
        let mut rng = Lcg(99);
        let boxes: Vec<Aabb> = (0..200).map(|_| rng.aabb()).collect();
        let ids: Vec<ProxyId> = boxes
            .iter()
            .enumerate()
            .map(|(i, a)| tree.create_proxy(a, i))
            .collect();

        for _ in 0..20 {
            let query = rng.aabb().expanded(5.0);
            let mut found = Vec::new();
            tree.query(&query, |id| {
                found.push(tree.user_data(id).unwrap());
                true
            });
            found.sort_unstable();

            let expected: Vec<usize> = ids
                .iter()
                .enumerate()
                .filter(|(_, id)| tree.fat_aabb(**id).overlaps(&query))
                .map(|(i, _)| i)
                .collect();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_tree_query_stops_when_callback_returns_false() {
        let mut tree: DynamicTree<u32> = DynamicTree::default();
        for i in 0..10 {
            tree.create_proxy(&Aabb::new(Vec2::ZERO, Vec2::ONE), i);
        }
        let mut visited = 0;
        tree.query(&Aabb::new(Vec2::ZERO, Vec2::ONE), |_| {
            visited += 1;
            false
        });
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_tree_collinear_inserts_stay_balanced() {
        let mut tree: DynamicTree<u32> = DynamicTree::default();
        for i in 0..256 {
            let min = Vec2::new(i as f32 * 2.0, 0.0);
            tree.create_proxy(&Aabb::new(min, min + Vec2::ONE), i);
        }
        assert!(tree.validate());
        assert!(tree.height() <= 20, "height: {}", tree.height());
    }

    #[test]
    fn test_tree_ray_cast_clips() {
        let mut tree: DynamicTree<u32> = DynamicTree::new(0.0, 0.0);
        for i in 0..5 {
            let x = 2.0 + i as f32 * 3.0;
            tree.create_proxy(&Aabb::new(Vec2::new(x, -1.0), Vec2::new(x + 1.0, 1.0)), i);
        }

        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(20.0, 0.0),
            max_fraction: 1.0,
        };

        // Clip to each hit; the nearest box wins.
        let mut closest = None;
        tree.ray_cast(&input, |sub, id| {
            let hit = tree.fat_aabb(id).ray_cast(sub);
            match hit {
                Some(out) => {
                    closest = tree.user_data(id);
                    out.fraction
                }
                None => sub.max_fraction,
            }
        });
        assert_eq!(closest, Some(0));

        // Stop at the first proxy reported.
        let mut calls = 0;
        tree.ray_cast(&input, |_, _| {
            calls += 1;
            0.0
        });
        assert_eq!(calls, 1);
    }
}
