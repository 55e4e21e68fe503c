//! In-memory run sorter.
//!
//! Chunks are sorted with a binary max-heap selection sort: the buffer is rearranged into an implicit max-heap
//! (children of index *i* live at *2i + 1* and *2i + 2*) and then the maximum is repeatedly swapped to the end of
//! the shrinking heap. The sort runs in *O(n log n)* time, needs no extra memory and is not stable.

/// Sorts the slice in ascending order in place.
pub fn heap_sort<T: Ord>(items: &mut [T]) {
    let len = items.len();
    if len <= 1 {
        return;
    }

    for idx in (0..len / 2).rev() {
        sift_down(items, idx, len);
    }

    for end in (1..len).rev() {
        items.swap(0, end);
        sift_down(items, 0, end);
    }
}

/// Restores the max-heap property of `items[..heap_len]` for the subtree rooted at `root`.
fn sift_down<T: Ord>(items: &mut [T], mut root: usize, heap_len: usize) {
    loop {
        let left = 2 * root + 1;
        let right = left + 1;
        let mut largest = root;

        if left < heap_len && items[left] > items[largest] {
            largest = left;
        }
        if right < heap_len && items[right] > items[largest] {
            largest = right;
        }
        if largest == root {
            return;
        }

        items.swap(root, largest);
        root = largest;
    }
}

/// Checks that every adjacent pair of items is in non-descending order.
/// Empty and single-item slices are sorted.
pub fn is_sorted<T: Ord>(items: &[T]) -> bool {
    items.windows(2).all(|pair| pair[0] <= pair[1])
}
