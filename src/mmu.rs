// SPDX-FileCopyrightText: 2025 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

use itertools::Itertools;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

static ZERO: i64 = 0;

/// Two-tier Intcode memory.
///
/// Addresses covered by the program image live in `dense`, a plain working copy of the image.
/// Everything past the end of the image lives in `sparse`, which is only allocated once the
/// program actually writes there.
#[derive(Clone, Default)]
pub(super) struct IntcodeMem {
    dense: Vec<i64>,
    sparse: Option<HashMap<i64, i64>>,
}

impl IntcodeMem {
    /// translate `i` into an index into `self.dense`, if it falls within it
    #[inline]
    fn dense_index(&self, i: i64) -> Option<usize> {
        usize::try_from(i).ok().filter(|&i| i < self.dense.len())
    }

    /// The number of ints in the dense tier, which is the length of the original image
    pub(super) fn image_len(&self) -> usize {
        self.dense.len()
    }

    /// The number of cells beyond the image that have been written to
    pub(super) fn sparse_len(&self) -> usize {
        self.sparse.as_ref().map_or(0, HashMap::len)
    }

    pub(super) fn get_range(&self, range: Range<i64>) -> Cow<'_, [i64]> {
        debug_assert!(range.start >= 0, "range must be checked by caller");
        if range.is_empty() {
            return Cow::Borrowed(&[]);
        }
        let (Some(start), Some(last)) = (self.dense_index(range.start), self.dense_index(range.end - 1))
        else {
            return Cow::Owned(range.map(|i| self[i]).collect());
        };
        Cow::Borrowed(&self.dense[start..=last])
    }
}

impl PartialEq for IntcodeMem {
    fn eq(&self, other: &Self) -> bool {
        fn nonzero(mem: &IntcodeMem) -> Vec<(i64, i64)> {
            mem.sparse
                .iter()
                .flatten()
                .filter(|&(_, &v)| v != 0)
                .map(|(&k, &v)| (k, v))
                .sorted_unstable()
                .collect()
        }
        self.dense == other.dense && nonzero(self) == nonzero(other)
    }
}

impl FromIterator<i64> for IntcodeMem {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            dense: iter.into_iter().collect(),
            sparse: None,
        }
    }
}

impl std::ops::Index<i64> for IntcodeMem {
    type Output = i64;
    fn index(&self, i: i64) -> &i64 {
        match self.dense_index(i) {
            Some(i) => &self.dense[i],
            None => self.sparse.as_ref().and_then(|s| s.get(&i)).unwrap_or(&ZERO),
        }
    }
}

impl std::ops::IndexMut<i64> for IntcodeMem {
    fn index_mut(&mut self, i: i64) -> &mut i64 {
        match self.dense_index(i) {
            Some(i) => &mut self.dense[i],
            None => self.sparse.get_or_insert_with(HashMap::new).entry(i).or_insert(0),
        }
    }
}

impl fmt::Debug for IntcodeMem {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fmtstruct = fmt.debug_struct("IntcodeMem");
        fmtstruct.field("image", &self.dense);
        if let Some(sparse) = self.sparse.as_ref() {
            fmtstruct.field(
                "extended",
                &format_args!(
                    "{{{}}}",
                    sparse
                        .iter()
                        .filter(|&(_, &v)| v != 0)
                        .sorted_unstable()
                        .format_with(", ", |(k, v), f| f(&format_args!("{k}: {v}")))
                ),
            );
        }
        fmtstruct.finish()
    }
}
