//! Fixed-size batching over any iterator.
//!
//! [`batch`] wraps a source iterator and yields owned `Vec`s of exactly
//! `size` items in source order; only the last batch may be shorter, and
//! an empty source yields no batches at all. The adapter is lazy and
//! single-pass: it is restartable only if the source is (re-call
//! [`batch`] on a fresh iterator).

use std::iter::FusedIterator;

use crate::error::{Error, Result};

/// Lazy fixed-size batching adapter. Created by [`batch`] or
/// [`Batched::batched`].
#[derive(Debug, Clone)]
pub struct Batches<I> {
    iter: I,
    size: usize,
    done: bool,
}

/// Split `source` into consecutive batches of `size` items.
///
/// # Errors
///
/// [`Error::InvalidArgument`] when `size` is zero.
///
/// # Example
///
/// ```rust
/// use arxiv_harvest_core::batch::batch;
///
/// let batches: Vec<Vec<i32>> = batch(1..=5, 2).unwrap().collect();
/// assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5]]);
/// ```
pub fn batch<I: IntoIterator>(source: I, size: usize) -> Result<Batches<I::IntoIter>> {
    if size == 0 {
        return Err(Error::invalid("batch size must be > 0"));
    }
    Ok(Batches {
        iter: source.into_iter(),
        size,
        done: false,
    })
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut bucket = Vec::with_capacity(self.size);
        bucket.extend(self.iter.by_ref().take(self.size));
        if bucket.len() < self.size {
            self.done = true;
        }
        if bucket.is_empty() {
            None
        } else {
            Some(bucket)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let (lo, hi) = self.iter.size_hint();
        (lo.div_ceil(self.size), hi.map(|h| h.div_ceil(self.size)))
    }
}

impl<I: Iterator> FusedIterator for Batches<I> {}

/// Method-call form of [`batch`].
pub trait Batched: Iterator + Sized {
    fn batched(self, size: usize) -> Result<Batches<Self>> {
        batch(self, size)
    }
}

impl<I: Iterator> Batched for I {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_size_rejected() {
        let err = batch(vec![1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        let mut batches = batch(Vec::<u8>::new(), 4).unwrap();
        assert!(batches.next().is_none());
        assert!(batches.next().is_none());
    }

    #[test]
    fn test_exact_multiple_has_no_short_tail() {
        let batches: Vec<_> = batch(0..6, 3).unwrap().collect();
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_short_final_batch() {
        let batches: Vec<_> = (0..7).batched(3).unwrap().collect();
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    }

    #[test]
    fn test_lazy_over_single_pass_source() {
        let mut pulled = 0;
        let source = std::iter::from_fn(|| {
            pulled += 1;
            (pulled <= 10).then_some(pulled)
        });
        let mut batches = batch(source, 4).unwrap();
        assert_eq!(batches.next(), Some(vec![1, 2, 3, 4]));
        drop(batches);
        assert_eq!(pulled, 4);
    }

    #[test]
    fn test_size_hint() {
        let batches = batch(0..10, 4).unwrap();
        assert_eq!(batches.size_hint(), (3, Some(3)));
    }

    proptest! {
        #[test]
        fn prop_batches_partition_source(
            source in proptest::collection::vec(any::<u32>(), 0..200),
            size in 1usize..32,
        ) {
            let batches: Vec<Vec<u32>> = batch(source.clone(), size).unwrap().collect();

            let total: usize = batches.iter().map(Vec::len).sum();
            prop_assert_eq!(total, source.len());

            let flattened: Vec<u32> = batches.iter().flatten().copied().collect();
            prop_assert_eq!(&flattened, &source);

            for (i, b) in batches.iter().enumerate() {
                prop_assert!(!b.is_empty());
                if i + 1 < batches.len() {
                    prop_assert_eq!(b.len(), size);
                } else {
                    prop_assert!(b.len() <= size);
                }
            }
        }
    }
}
