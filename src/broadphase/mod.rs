//! Broadphase: candidate pair generation on top of the dynamic tree.
//!
//! Proxies that were created or reinserted since the last update are kept in
//! a move buffer. [`BroadPhase::update_pairs`] queries the tree with each
//! buffered proxy's fat AABB and reports every overlapping pair once.

pub mod dynamic_tree;

pub use dynamic_tree::{DynamicTree, ProxyId, NULL_NODE};

use glam::Vec2;

use crate::collision::aabb::{Aabb, RayCastInput};

/// Broadphase over a [`DynamicTree`].
#[derive(Debug, Clone)]
pub struct BroadPhase<T> {
    tree: DynamicTree<T>,
    move_buffer: Vec<ProxyId>,
    pair_buffer: Vec<(ProxyId, ProxyId)>,
}

impl<T: Copy> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new(0.1, 4.0)
    }
}

impl<T: Copy> BroadPhase<T> {
    pub fn new(aabb_extension: f32, aabb_multiplier: f32) -> Self {
        Self {
            tree: DynamicTree::new(aabb_extension, aabb_multiplier),
            move_buffer: Vec::with_capacity(16),
            pair_buffer: Vec::with_capacity(16),
        }
    }

    /// Create a proxy with the tight AABB. Pairs are reported on the next update.
    pub fn create_proxy(&mut self, aabb: &Aabb, user_data: T) -> ProxyId {
        let proxy_id = self.tree.create_proxy(aabb, user_data);
        self.buffer_move(proxy_id);
        proxy_id
    }

    /// Destroy a proxy. Existing pairs are not reported as ended; the caller
    /// destroys its own pair objects.
    pub fn destroy_proxy(&mut self, proxy_id: ProxyId) {
        self.unbuffer_move(proxy_id);
        self.tree.destroy_proxy(proxy_id);
    }

    /// Move a proxy. Only buffered for pair generation if it was reinserted.
    pub fn move_proxy(&mut self, proxy_id: ProxyId, aabb: &Aabb, displacement: Vec2) {
        // Already buffered since the last update.
        let buffered = self.tree.was_moved(proxy_id);
        if self.tree.move_proxy(proxy_id, aabb, displacement) && !buffered {
            self.buffer_move(proxy_id);
        }
    }

    /// Force pair generation for a proxy on the next update.
    pub fn touch_proxy(&mut self, proxy_id: ProxyId) {
        if self.tree.mark_moved(proxy_id) {
            self.buffer_move(proxy_id);
        }
    }

    #[inline]
    pub fn fat_aabb(&self, proxy_id: ProxyId) -> Aabb {
        self.tree.fat_aabb(proxy_id)
    }

    #[inline]
    pub fn user_data(&self, proxy_id: ProxyId) -> Option<T> {
        self.tree.user_data(proxy_id)
    }

    /// Do the fat AABBs of two proxies overlap?
    #[inline]
    pub fn test_overlap(&self, proxy_a: ProxyId, proxy_b: ProxyId) -> bool {
        self.tree
            .fat_aabb(proxy_a)
            .overlaps(&self.tree.fat_aabb(proxy_b))
    }

    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.tree.proxy_count()
    }

    #[inline]
    pub fn tree(&self) -> &DynamicTree<T> {
        &self.tree
    }

    /// Report each new candidate pair through `callback`.
    pub fn update_pairs<F>(&mut self, mut callback: F)
    where
        F: FnMut(T, T),
    {
        self.pair_buffer.clear();

        for &query_proxy in &self.move_buffer {
            if query_proxy == NULL_NODE {
                continue;
            }

            let fat = self.tree.fat_aabb(query_proxy);
            let tree = &self.tree;
            let pairs = &mut self.pair_buffer;
            tree.query(&fat, |proxy_id| {
                // A proxy cannot form a pair with itself.
                if proxy_id == query_proxy {
                    return true;
                }

                // Both moved: only the lower id reports the pair.
                if tree.was_moved(proxy_id) && proxy_id > query_proxy {
                    return true;
                }

                pairs.push((proxy_id.min(query_proxy), proxy_id.max(query_proxy)));
                true
            });
        }

        for &proxy_id in &self.move_buffer {
            if proxy_id != NULL_NODE {
                self.tree.clear_moved(proxy_id);
            }
        }
        self.move_buffer.clear();

        for &(a, b) in &self.pair_buffer {
            if let (Some(data_a), Some(data_b)) = (self.tree.user_data(a), self.tree.user_data(b)) {
                callback(data_a, data_b);
            }
        }
    }

    /// See [`DynamicTree::query`].
    pub fn query<F>(&self, aabb: &Aabb, callback: F)
    where
        F: FnMut(ProxyId) -> bool,
    {
        self.tree.query(aabb, callback);
    }

    /// See [`DynamicTree::ray_cast`].
    pub fn ray_cast<F>(&self, input: &RayCastInput, callback: F)
    where
        F: FnMut(&RayCastInput, ProxyId) -> f32,
    {
        self.tree.ray_cast(input, callback);
    }

    fn buffer_move(&mut self, proxy_id: ProxyId) {
        self.move_buffer.push(proxy_id);
    }

    fn unbuffer_move(&mut self, proxy_id: ProxyId) {
        for slot in self.move_buffer.iter_mut() {
            if *slot == proxy_id {
                *slot = NULL_NODE;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f32, y: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::new(x + 1.0, y + 1.0))
    }

    #[test]
    fn test_broadphase_overlapping() {
        let mut bp: BroadPhase<u32> = BroadPhase::default();
        bp.create_proxy(&unit_box(0.0, 0.0), 0);
        bp.create_proxy(&unit_box(0.5, 0.0), 1);
        bp.create_proxy(&unit_box(10.0, 0.0), 2);

        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a.min(b), a.max(b))));
        assert_eq!(pairs, vec![(0, 1)]);

        // Nothing moved: no pairs reported again.
        let mut count = 0;
        bp.update_pairs(|_, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_broadphase_move_reports_new_pair() {
        let mut bp: BroadPhase<u32> = BroadPhase::default();
        let a = bp.create_proxy(&unit_box(0.0, 0.0), 0);
        let b = bp.create_proxy(&unit_box(5.0, 0.0), 1);
        bp.update_pairs(|_, _| {});

        // Small move stays inside the fat AABB.
        bp.move_proxy(a, &unit_box(0.05, 0.0), Vec2::new(0.05, 0.0));
        let mut count = 0;
        bp.update_pairs(|_, _| count += 1);
        assert_eq!(count, 0);

        bp.move_proxy(a, &unit_box(4.5, 0.0), Vec2::new(4.45, 0.0));
        let mut pairs = Vec::new();
        bp.update_pairs(|x, y| pairs.push((x, y)));
        assert_eq!(pairs.len(), 1);
        assert!(bp.test_overlap(a, b));
    }

    #[test]
    fn test_broadphase_destroyed_proxy_not_reported() {
        let mut bp: BroadPhase<u32> = BroadPhase::default();
        bp.create_proxy(&unit_box(0.0, 0.0), 0);
        let b = bp.create_proxy(&unit_box(0.5, 0.0), 1);
        bp.destroy_proxy(b);

        let mut count = 0;
        bp.update_pairs(|_, _| count += 1);
        assert_eq!(count, 0);
        assert_eq!(bp.proxy_count(), 1);
    }

    #[test]
    fn test_broadphase_both_moved_reported_once() {
        let mut bp: BroadPhase<u32> = BroadPhase::default();
        for i in 0..5 {
            bp.create_proxy(&unit_box(i as f32 * 0.5, 0.0), i);
        }
        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a.min(b), a.max(b))));
        let count = pairs.len();
        pairs.sort_unstable();
        pairs.dedup();
        assert_eq!(pairs.len(), count);
    }

    #[test]
    fn test_broadphase_touch_twice_reports_pair_once() {
        let mut bp: BroadPhase<u32> = BroadPhase::default();
        let a = bp.create_proxy(&unit_box(0.0, 0.0), 0);
        let b = bp.create_proxy(&unit_box(0.5, 0.0), 1);
        bp.update_pairs(|_, _| {});

        bp.touch_proxy(a);
        bp.touch_proxy(a);
        bp.touch_proxy(b);
        let mut pairs = Vec::new();
        bp.update_pairs(|x, y| pairs.push((x.min(y), x.max(y))));
        assert_eq!(pairs, vec![(0, 1)]);
        assert!(!bp.tree.was_moved(a), "move flags clear after the update");
    }

    #[test]
    fn test_broadphase_move_after_create_buffers_once() {
        let mut bp: BroadPhase<u32> = BroadPhase::default();
        let a = bp.create_proxy(&unit_box(0.0, 0.0), 0);
        bp.create_proxy(&unit_box(5.0, 0.0), 1);
        bp.move_proxy(a, &unit_box(4.5, 0.0), Vec2::new(4.5, 0.0));
        assert_eq!(bp.move_buffer.len(), 2);

        let mut pairs = Vec::new();
        bp.update_pairs(|x, y| pairs.push((x, y)));
        assert_eq!(pairs.len(), 1);
    }
}
