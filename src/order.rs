//! Axis ordering for traversal, after StridedViews.jl's `indexorder` and
//! Strided.jl's `_mapreduce_order!`.

use crate::flags::IterOrder;

/// Compute the relative order of strides.
///
/// Returns a vector where `result[i]` is the rank of `|strides[i]|` among all
/// non-zero strides (1 = smallest). Zero strides have order 1.
pub(crate) fn index_order(strides: &[isize]) -> Vec<usize> {
    strides
        .iter()
        .map(|&si| {
            let si = si.unsigned_abs();
            if si == 0 {
                return 1;
            }
            1 + strides
                .iter()
                .filter(|&&s| s != 0 && s.unsigned_abs() < si)
                .count()
        })
        .collect()
}

/// Permutation of axes in traversal order, outermost first.
///
/// For [`IterOrder::K`], axes with larger strides go outside, unit-extent
/// axes go outermost (they never move), and ties keep C order so that
/// broadcast (zero-stride) views walk like row-major arrays.
pub(crate) fn traversal_order(dims: &[usize], strides: &[isize], order: IterOrder) -> Vec<usize> {
    let rank = dims.len();
    match order {
        IterOrder::C => (0..rank).collect(),
        IterOrder::F => (0..rank).rev().collect(),
        IterOrder::K => {
            let ranks = index_order(strides);
            let key = |d: usize| if dims[d] <= 1 { usize::MAX } else { ranks[d] };
            let mut perm: Vec<usize> = (0..rank).collect();
            // Stable sort: equal keys stay in axis order
            perm.sort_by(|&a, &b| key(b).cmp(&key(a)));
            perm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_order() {
        assert_eq!(index_order(&[4, 1, 2]), vec![3, 1, 2]);
        assert_eq!(index_order(&[4, 0, 2]), vec![2, 1, 1]);
        assert_eq!(index_order(&[-4, 1, -2]), vec![3, 1, 2]);
        assert_eq!(index_order(&[2, 2, 1]), vec![2, 2, 1]);
    }

    #[test]
    fn test_order_row_major() {
        let order = traversal_order(&[3, 4, 5], &[20, 5, 1], IterOrder::K);
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_order_column_major() {
        let order = traversal_order(&[4, 5], &[1, 4], IterOrder::K);
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_order_permuted_3d() {
        // strides [1, 12, 3]: axis 1 outermost, axis 0 innermost
        let order = traversal_order(&[3, 4, 4], &[1, 12, 3], IterOrder::K);
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_order_unit_axis_outermost() {
        let order = traversal_order(&[4, 1, 5], &[1, 4, 4], IterOrder::K);
        assert_eq!(order[0], 1);
        assert_eq!(order[2], 0);
    }

    #[test]
    fn test_order_negative_strides() {
        let order = traversal_order(&[4, 5], &[-1, -4], IterOrder::K);
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_order_broadcast_ties_keep_c_order() {
        let order = traversal_order(&[2, 3], &[0, 0], IterOrder::K);
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_order_explicit() {
        assert_eq!(traversal_order(&[2, 3, 4], &[1, 2, 6], IterOrder::C), vec![0, 1, 2]);
        assert_eq!(traversal_order(&[2, 3, 4], &[12, 4, 1], IterOrder::F), vec![2, 1, 0]);
        assert!(traversal_order(&[], &[], IterOrder::K).is_empty());
    }
}
