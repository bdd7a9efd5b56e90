//! Static 2D k-d tree for fixed-radius neighbor queries.
//!
//! The tree is implicit: points are permuted so that every subrange has its
//! median at the middle, split on x and y alternately by depth.

use crate::math as m;

#[derive(Clone, Debug, Default)]
pub(crate) struct KdTree {
    /// Points paired with their index in the input.
    nodes: Vec<(m::Vec2, usize)>,
}

impl KdTree {
    /// Rebuild the tree over a new point set, reusing the allocation.
    pub fn rebuild(&mut self, points: impl IntoIterator<Item = m::Vec2>) {
        self.nodes.clear();
        self.nodes
            .extend(points.into_iter().enumerate().map(|(i, p)| (p, i)));
        build(&mut self.nodes, 0);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Push the original index of every point within `radius` of `center` to `out`.
    pub fn within_radius(&self, center: m::Vec2, radius: f64, out: &mut Vec<usize>) {
        self.query(0, self.nodes.len(), 0, center, radius * radius, out);
    }

    fn query(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        center: m::Vec2,
        radius_sq: f64,
        out: &mut Vec<usize>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let (p, index) = self.nodes[mid];
        if (p - center).mag_sq() <= radius_sq {
            out.push(index);
        }
        let diff = axis(center, depth) - axis(p, depth);
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.query(near.0, near.1, depth + 1, center, radius_sq, out);
        if diff * diff <= radius_sq {
            self.query(far.0, far.1, depth + 1, center, radius_sq, out);
        }
    }
}

#[inline]
fn axis(p: m::Vec2, depth: usize) -> f64 {
    if depth % 2 == 0 {
        p.x
    } else {
        p.y
    }
}

fn build(items: &mut [(m::Vec2, usize)], depth: usize) {
    if items.len() <= 1 {
        return;
    }
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| axis(a.0, depth).total_cmp(&axis(b.0, depth)));
    let (left, right) = items.split_at_mut(mid);
    build(left, depth + 1);
    build(&mut right[1..], depth + 1);
}
