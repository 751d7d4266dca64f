use boolinator::Boolinator;
use enum_iterator::IntoEnumIterator;

#[cfg(feature = "persist")]
use serde::{Deserialize, Serialize};

/// Decides how coordinates that fall outside of the grid are handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoEnumIterator)]
#[cfg_attr(feature = "persist", derive(Serialize, Deserialize))]
pub enum Overflow {
    /// Coordinates wrap around to the opposite edge, making the grid a torus.
    Wrap,
    /// Coordinates outside of the grid are left out entirely.
    Skip,
}

impl Default for Overflow {
    fn default() -> Self {
        Overflow::Skip
    }
}

impl Overflow {
    /// Resolve a coordinate along an axis of length `len`.
    ///
    /// Returns `None` if the neighbor must be skipped. `Wrap` never skips, except on an
    /// empty axis where there is nothing to wrap onto.
    #[inline]
    pub fn resolve(self, coord: isize, len: usize) -> Option<usize> {
        match self {
            Overflow::Wrap => (len != 0).as_some_from(|| coord.rem_euclid(len as isize) as usize),
            Overflow::Skip => (coord >= 0 && (coord as usize) < len).as_some(coord as usize),
        }
    }

    /// Resolve a `(row, col)` coordinate against a `(rows, cols)` grid.
    ///
    /// Both axes must be in bounds for the coordinate to be in bounds.
    #[inline]
    pub fn resolve2(
        self,
        (row, col): (isize, isize),
        (rows, cols): (usize, usize),
    ) -> Option<(usize, usize)> {
        Some((self.resolve(row, rows)?, self.resolve(col, cols)?))
    }

    /// Resolve the coordinate `delta` cells away from `center` along an axis of length `len`.
    ///
    /// Unlike adding the two first, this never overflows: a `delta` too large to reach
    /// is skipped, or reduced modulo `len` before it is applied when wrapping.
    #[inline]
    pub fn offset(self, center: usize, delta: isize, len: usize) -> Option<usize> {
        match self {
            Overflow::Wrap => (len != 0).as_some_from(|| {
                let delta = delta.rem_euclid(len as isize) as usize;
                (center % len + delta) % len
            }),
            Overflow::Skip => (center as isize)
                .checked_add(delta)
                .and_then(|coord| self.resolve(coord, len)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn skip_leaves_out_edges() {
        assert_eq!(Overflow::Skip.resolve(-1, 5), None);
        assert_eq!(Overflow::Skip.resolve(5, 5), None);
        assert_eq!(Overflow::Skip.resolve(0, 5), Some(0));
        assert_eq!(Overflow::Skip.resolve(4, 5), Some(4));
    }

    #[test]
    fn wrap_goes_around() {
        assert_eq!(Overflow::Wrap.resolve(-1, 5), Some(4));
        assert_eq!(Overflow::Wrap.resolve(5, 5), Some(0));
        assert_eq!(Overflow::Wrap.resolve(-12, 5), Some(3));
        assert_eq!(Overflow::Wrap.resolve(3, 0), None);
    }

    #[test]
    fn tuple_fails_on_any_axis() {
        assert_eq!(Overflow::Skip.resolve2((0, 3), (2, 3)), None);
        assert_eq!(Overflow::Skip.resolve2((2, 0), (2, 3)), None);
        assert_eq!(Overflow::Skip.resolve2((1, 2), (2, 3)), Some((1, 2)));
        assert_eq!(Overflow::Wrap.resolve2((-1, 3), (2, 3)), Some((1, 0)));
    }

    #[test]
    fn huge_offsets_do_not_overflow() {
        assert_eq!(Overflow::Skip.offset(1, isize::MAX, 3), None);
        assert_eq!(Overflow::Skip.offset(0, isize::MIN, 3), None);
        assert_eq!(Overflow::Skip.offset(1, -1, 3), Some(0));
        // isize::MAX is 1 mod 3.
        assert_eq!(Overflow::Wrap.offset(2, isize::MAX, 3), Some(0));
        assert_eq!(Overflow::Wrap.offset(0, isize::MIN, 3), Some(1));
        assert_eq!(Overflow::Wrap.offset(0, 5, 0), None);
    }

    #[test]
    fn skip_is_default() {
        assert_eq!(Overflow::default(), Overflow::Skip);
        assert_eq!(Overflow::into_enum_iter().count(), 2);
    }

    proptest! {
        #[test]
        fn wrap_is_always_in_bounds(coord in -10_000isize..10_000, len in 1usize..500) {
            let resolved = Overflow::Wrap.resolve(coord, len);
            prop_assert!(matches!(resolved, Some(c) if c < len));
        }

        #[test]
        fn skip_keeps_only_in_bounds(coord in -1_000isize..1_000, len in 0usize..500) {
            let inside = coord >= 0 && (coord as usize) < len;
            prop_assert_eq!(Overflow::Skip.resolve(coord, len).is_some(), inside);
            if inside {
                prop_assert_eq!(Overflow::Skip.resolve(coord, len), Some(coord as usize));
            }
        }

        #[test]
        fn offset_agrees_with_resolve(center in 0usize..100, delta in -1_000isize..1_000, len in 1usize..100) {
            let center = center % len;
            for overflow in Overflow::into_enum_iter() {
                prop_assert_eq!(
                    overflow.offset(center, delta, len),
                    overflow.resolve(center as isize + delta, len)
                );
            }
        }
    }
}
