//! Multi-index ↔ linear-offset arithmetic over a list of per-axis counts.
//!
//! This is the only place in the crate where a Dataset's geometry is mapped
//! to a linear memory address; [`crate::dependent_variable`]'s
//! cross-section and sparse-packing routines are built entirely on top of
//! these five functions. Grounded on the source's `RMNGridUtils.h`: the
//! stride-then-offset formulas here are a direct transcription of
//! `strideAlongDimensionIndex`/`memOffsetFromIndexes`/`setIndexesForMemOffset`.

/// `stride_along(i) = Π_{j<i} counts[j]`.
pub fn stride_along(counts: &[usize], i: usize) -> usize {
    counts[..i].iter().product()
}

/// Per-axis strides for the whole axis list, computed once and reused by
/// every call site rather than recomputed per element.
pub fn strides(counts: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(counts.len());
    let mut acc = 1usize;
    for &c in counts {
        out.push(acc);
        acc *= c;
    }
    out
}

fn wrap(v: isize, n: usize) -> usize {
    let n = n as isize;
    (((v % n) + n) % n) as usize
}

/// `Σ_i (wrap(indexes[i], counts[i]) · stride_i)`.
pub fn flat_offset(counts: &[usize], strides: &[usize], indexes: &[isize]) -> usize {
    indexes
        .iter()
        .zip(counts.iter())
        .zip(strides.iter())
        .map(|((&idx, &n), &stride)| wrap(idx, n) * stride)
        .sum()
}

/// `indexes[i] = (offset / stride_i) mod counts[i]`.
pub fn unflatten(counts: &[usize], strides: &[usize], offset: usize) -> Vec<usize> {
    counts
        .iter()
        .zip(strides.iter())
        .map(|(&n, &stride)| (offset / stride) % n)
        .collect()
}

/// Like [`unflatten`], but fills only the axes whose index is *not* present
/// in `ignored`, using strides recomputed over just those axes.
pub fn unflatten_ignoring(counts: &[usize], offset: usize, ignored: &[usize]) -> Vec<usize> {
    let free_counts: Vec<usize> = counts
        .iter()
        .enumerate()
        .filter(|(i, _)| !ignored.contains(i))
        .map(|(_, &c)| c)
        .collect();
    let free_strides = strides(&free_counts);
    let free_values = unflatten(&free_counts, &free_strides, offset);

    let mut out = vec![0usize; counts.len()];
    let mut free_iter = free_values.into_iter();
    for (i, slot) in out.iter_mut().enumerate() {
        if !ignored.contains(&i) {
            *slot = free_iter.next().expect("free axis count matches");
        }
    }
    out
}

/// `Π` over the axes of `counts` whose index is not in `ignored`.
pub fn product_ignoring(counts: &[usize], ignored: &[usize]) -> usize {
    counts
        .iter()
        .enumerate()
        .filter(|(i, _)| !ignored.contains(i))
        .map(|(_, &c)| c)
        .product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_along_matches_formula() {
        let counts = [3usize, 4, 5];
        assert_eq!(stride_along(&counts, 0), 1);
        assert_eq!(stride_along(&counts, 1), 3);
        assert_eq!(stride_along(&counts, 2), 12);
    }

    #[test]
    fn flat_offset_and_unflatten_round_trip() {
        let counts = [3usize, 4];
        let s = strides(&counts);
        for i in 0..3 {
            for j in 0..4 {
                let idx = [i as isize, j as isize];
                let offset = flat_offset(&counts, &s, &idx);
                assert_eq!(unflatten(&counts, &s, offset), vec![i, j]);
            }
        }
    }

    #[test]
    fn negative_index_wraps() {
        let counts = [4usize];
        let s = strides(&counts);
        assert_eq!(flat_offset(&counts, &s, &[-1]), 3);
    }

    #[test]
    fn unflatten_ignoring_skips_named_axes() {
        // 3x4 grid, ignore dim 0: fixed at coord 1, free axis is dim1 size 4.
        let counts = [3usize, 4];
        let out = unflatten_ignoring(&counts, 2, &[0]);
        assert_eq!(out[1], 2);
    }

    #[test]
    fn product_ignoring_skips_named_axes() {
        let counts = [3usize, 4, 5];
        assert_eq!(product_ignoring(&counts, &[1]), 15);
        assert_eq!(product_ignoring(&counts, &[]), 60);
    }
}
