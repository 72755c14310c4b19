//! Stable natural merge sort used to order loaded edits.
//!
//! Edit logs are mostly appended in ping order, so the input usually consists
//! of a few long ascending runs. The sort detects those runs, extends short
//! ones with insertion sort, and merges adjacent runs bottom-up. Merges whose
//! halves are already in order are skipped entirely.
//!
//! Equal elements keep their input order; the apply engine relies on this for
//! last-write-wins among edits sharing a timestamp.

use std::cmp::Ordering;

/// Inputs of at most this many elements are insertion sorted directly.
pub const INSERTION_SORT_MAX: usize = 5;

/// Natural runs shorter than this are extended by insertion sort before
/// merging.
const MIN_RUN: usize = 8;

/// Sort `items` stably by `cmp`. Worst case `O(n log n)` comparisons.
pub fn stable_sort_by<T, F>(items: &mut [T], mut cmp: F)
where
    T: Copy,
    F: FnMut(&T, &T) -> Ordering,
{
    if items.len() <= INSERTION_SORT_MAX {
        insertion_sort_from(items, 1, &mut cmp);
        return;
    }

    let mut bounds = natural_runs(items, &mut cmp);
    if bounds.len() <= 2 {
        return;
    }

    let mut scratch: Vec<T> = Vec::with_capacity(items.len() / 2 + 1);
    while bounds.len() > 2 {
        let mut merged = Vec::with_capacity(bounds.len() / 2 + 2);
        let mut idx = 0;
        while idx + 2 < bounds.len() {
            merge_adjacent(
                items,
                bounds[idx],
                bounds[idx + 1],
                bounds[idx + 2],
                &mut scratch,
                &mut cmp,
            );
            merged.push(bounds[idx]);
            idx += 2;
        }
        merged.extend_from_slice(&bounds[idx..]);
        bounds = merged;
    }
}

/// Insertion sort `items[sorted..]` into the already sorted prefix.
fn insertion_sort_from<T, F>(items: &mut [T], sorted: usize, cmp: &mut F)
where
    T: Copy,
    F: FnMut(&T, &T) -> Ordering,
{
    for i in sorted.max(1)..items.len() {
        let current = items[i];
        let mut j = i;
        while j > 0 && cmp(&current, &items[j - 1]) == Ordering::Less {
            items[j] = items[j - 1];
            j -= 1;
        }
        items[j] = current;
    }
}

/// Split `items` into sorted runs and return the run boundaries, starting
/// with `0` and ending with `items.len()`.
///
/// Strictly descending runs are reversed in place; strictness keeps equal
/// elements out of reversed runs so stability holds.
fn natural_runs<T, F>(items: &mut [T], cmp: &mut F) -> Vec<usize>
where
    T: Copy,
    F: FnMut(&T, &T) -> Ordering,
{
    let len = items.len();
    let mut bounds = vec![0];
    let mut start = 0;
    while start < len {
        let mut end = start + 1;
        if end < len && cmp(&items[end], &items[end - 1]) == Ordering::Less {
            while end < len && cmp(&items[end], &items[end - 1]) == Ordering::Less {
                end += 1;
            }
            items[start..end].reverse();
        } else {
            while end < len && cmp(&items[end], &items[end - 1]) != Ordering::Less {
                end += 1;
            }
        }

        if end - start < MIN_RUN && end < len {
            let target = (start + MIN_RUN).min(len);
            insertion_sort_from(&mut items[start..target], end - start, cmp);
            end = target;
        }

        bounds.push(end);
        start = end;
    }
    bounds
}

/// Merge sorted `items[lo..mid]` and `items[mid..hi]`.
fn merge_adjacent<T, F>(
    items: &mut [T],
    lo: usize,
    mid: usize,
    hi: usize,
    scratch: &mut Vec<T>,
    cmp: &mut F,
) where
    T: Copy,
    F: FnMut(&T, &T) -> Ordering,
{
    if lo == mid || mid == hi || cmp(&items[mid], &items[mid - 1]) != Ordering::Less {
        return;
    }

    scratch.clear();
    scratch.extend_from_slice(&items[lo..mid]);

    let mut left = 0;
    let mut right = mid;
    let mut out = lo;
    while left < scratch.len() && right < hi {
        // Take from the right only when strictly smaller: ties favor the left.
        if cmp(&items[right], &scratch[left]) == Ordering::Less {
            items[out] = items[right];
            right += 1;
        } else {
            items[out] = scratch[left];
            left += 1;
        }
        out += 1;
    }
    while left < scratch.len() {
        items[out] = scratch[left];
        left += 1;
        out += 1;
    }
}
