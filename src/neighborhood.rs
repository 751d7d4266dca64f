use crate::{Context, Error, Grid, Overflow, State};
use enum_iterator::IntoEnumIterator;
use float_ord::FloatOrd;
use itertools::iproduct;
use log::warn;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::str::FromStr;
use thread_local::ThreadLocal;

#[cfg(feature = "persist")]
use serde::{Deserialize, Serialize};

/// The shape of a [`Radial`] neighborhood.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, IntoEnumIterator)]
#[cfg_attr(feature = "persist", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Cells on either side along a single axis, as used by Wolfram's elementary automata.
    OneDim,
    /// The full square around the cell.
    Moore,
    /// The diamond of cells within a manhattan distance of `radius`.
    VonNeumann,
    /// The corners of the Moore square that the von Neumann diamond leaves out.
    RotVonNeumann,
}

impl Default for Shape {
    fn default() -> Self {
        Shape::Moore
    }
}

impl Shape {
    /// The lowercase name used when parsing and printing the shape.
    pub fn name(self) -> &'static str {
        match self {
            Shape::OneDim => "onedim",
            Shape::Moore => "moore",
            Shape::VonNeumann => "vonneumann",
            Shape::RotVonNeumann => "rotvonneumann",
        }
    }

    /// The number of grid axes this shape works on.
    pub fn axes(self) -> usize {
        match self {
            Shape::OneDim => 1,
            _ => 2,
        }
    }

    /// Check if the offset `(dr, dc)` from the center, already within the square of
    /// `radius`, is part of this shape. The center itself is never visited.
    #[inline]
    pub fn contains(self, dr: isize, dc: isize, radius: isize) -> bool {
        let manhattan = dr.abs() + dc.abs();
        match self {
            Shape::OneDim => dc == 0,
            Shape::Moore => true,
            Shape::VonNeumann => manhattan <= radius,
            Shape::RotVonNeumann => manhattan > radius,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let name = s.trim().trim_start_matches(':').to_ascii_lowercase();
        Shape::into_enum_iter()
            .find(|shape| shape.name() == name)
            .ok_or_else(|| Error::UnknownShape(s.to_owned()))
    }
}

/// A neighborhood defined by a shape and the distance from the center cell to its edge.
///
/// A neighborhood with radius 1 is 3 cells wide.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "persist", derive(Serialize, Deserialize))]
pub struct Radial {
    shape: Shape,
    radius: usize,
    overflow: Overflow,
}

impl Default for Radial {
    fn default() -> Self {
        Radial {
            shape: Shape::Moore,
            radius: 1,
            overflow: Overflow::Skip,
        }
    }
}

impl Radial {
    /// Make a neighborhood, rejecting a radius of 0.
    pub fn new(shape: Shape, radius: usize, overflow: Overflow) -> Result<Self, Error> {
        if radius == 0 || radius > isize::MAX as usize {
            return Err(Error::InvalidRadius);
        }
        Ok(Radial {
            shape,
            radius,
            overflow,
        })
    }

    /// Radius 1 Moore neighborhood.
    pub fn moore(overflow: Overflow) -> Self {
        Radial {
            overflow,
            ..Radial::default()
        }
    }

    /// Radius 1 von Neumann neighborhood.
    pub fn von_neumann(overflow: Overflow) -> Self {
        Radial {
            shape: Shape::VonNeumann,
            overflow,
            ..Radial::default()
        }
    }

    /// The shape of the neighborhood.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// The distance from the center cell to the edge of the neighborhood.
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// How neighbors past the edge of the grid are handled.
    pub fn overflow(&self) -> Overflow {
        self.overflow
    }

    /// Every offset visited by this neighborhood in row-major order.
    pub fn offsets(&self) -> impl Iterator<Item = (isize, isize)> {
        let shape = self.shape;
        let r = self.radius as isize;
        let cols = if shape == Shape::OneDim { 0..=0 } else { -r..=r };
        iproduct!(-r..=r, cols)
            .filter(move |&(dr, dc)| (dr, dc) != (0, 0) && shape.contains(dr, dc, r))
    }

    /// Sum the neighbors of the cell at `index`.
    pub fn sum<C: State>(&self, source: &Grid<C>, index: &[usize]) -> f64 {
        match self.shape {
            Shape::OneDim => {
                let offsets = self.offsets().map(|(d, _)| d);
                sum_line(source, index, offsets, self.overflow)
            }
            _ => sum_offsets(source, index, self.offsets(), self.overflow),
        }
    }
}

/// A neighborhood of arbitrary shape given as `(row, col)` offsets from the center cell.
///
/// Offsets are visited in the order given. An empty neighborhood always sums to zero.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "persist", derive(Serialize, Deserialize))]
pub struct Custom {
    offsets: Vec<(isize, isize)>,
    overflow: Overflow,
}

impl Custom {
    /// Make a neighborhood from `(row, col)` offsets. Offsets of any size are allowed.
    pub fn new(offsets: impl IntoIterator<Item = (isize, isize)>, overflow: Overflow) -> Self {
        Custom {
            offsets: offsets.into_iter().collect(),
            overflow,
        }
    }

    /// The offsets in the order they are visited.
    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }

    pub fn overflow(&self) -> Overflow {
        self.overflow
    }

    /// Sum the cells at every offset from `index`.
    pub fn sum<C: State>(&self, source: &Grid<C>, index: &[usize]) -> f64 {
        sum_offsets(source, index, self.offsets.iter().copied(), self.overflow)
    }
}

/// Several custom neighborhoods that are summed separately, so a rule can treat each
/// group differently.
///
/// The per-group sums are written into a scratch buffer that is reused for every cell.
/// Each thread that sums this neighborhood gets its own buffer.
#[derive(Debug)]
pub struct MultiCustom {
    groups: Vec<Vec<(isize, isize)>>,
    overflow: Overflow,
    scratch: ThreadLocal<RefCell<Vec<f64>>>,
}

impl Clone for MultiCustom {
    fn clone(&self) -> Self {
        MultiCustom {
            groups: self.groups.clone(),
            overflow: self.overflow,
            scratch: ThreadLocal::new(),
        }
    }
}

impl MultiCustom {
    /// Make a neighborhood from groups of `(row, col)` offsets, one sum per group.
    pub fn new<G>(groups: impl IntoIterator<Item = G>, overflow: Overflow) -> Self
    where
        G: IntoIterator<Item = (isize, isize)>,
    {
        MultiCustom {
            groups: groups
                .into_iter()
                .map(|group| group.into_iter().collect())
                .collect(),
            overflow,
            scratch: ThreadLocal::new(),
        }
    }

    /// The offset groups in the order their sums are reported.
    pub fn groups(&self) -> &[Vec<(isize, isize)>] {
        &self.groups
    }

    pub fn overflow(&self) -> Overflow {
        self.overflow
    }

    /// Sum every group for the cell at `index`.
    ///
    /// The sums live in this thread's scratch buffer. If an earlier result on the same
    /// thread still holds the buffer, they are collected into a fresh vector instead.
    pub fn sum<C: State>(&self, source: &Grid<C>, index: &[usize]) -> Aggregate<'_> {
        let scratch = self
            .scratch
            .get_or(|| RefCell::new(vec![0.0; self.groups.len()]));
        match scratch.try_borrow_mut() {
            Ok(mut sums) => {
                self.sum_into(source, index, &mut sums);
                drop(sums);
                // The exclusive borrow above succeeded, so no other borrow is live.
                Aggregate::Groups(Ref::map(scratch.borrow(), |sums| &sums[..]))
            }
            Err(_) => {
                let mut sums = vec![0.0; self.groups.len()];
                self.sum_into(source, index, &mut sums);
                Aggregate::Owned(sums)
            }
        }
    }

    fn sum_into<C: State>(&self, source: &Grid<C>, index: &[usize], sums: &mut [f64]) {
        for (sum, group) in sums.iter_mut().zip(&self.groups) {
            *sum = sum_offsets(source, index, group.iter().copied(), self.overflow);
        }
    }
}

/// The combined value of a neighborhood around a single cell.
#[derive(Debug)]
pub enum Aggregate<'a> {
    /// The weighted sum of a single-group neighborhood.
    Sum(f64),
    /// One sum per group of a [`MultiCustom`] neighborhood, borrowed from its scratch buffer.
    Groups(Ref<'a, [f64]>),
    /// One sum per group, used while the scratch buffer is held by another aggregate.
    Owned(Vec<f64>),
}

impl Aggregate<'_> {
    /// The sum over every group.
    pub fn total(&self) -> f64 {
        self.groups().iter().sum()
    }

    /// The sum of every group in order. A single-group neighborhood has one.
    pub fn groups(&self) -> &[f64] {
        match self {
            Aggregate::Sum(sum) => std::slice::from_ref(sum),
            Aggregate::Groups(sums) => &**sums,
            Aggregate::Owned(sums) => sums,
        }
    }
}

/// Get the group with the largest sum. Ties go to the first group.
pub fn dominant_group(sums: &[f64]) -> Option<usize> {
    sums.iter()
        .enumerate()
        .rev()
        .max_by_key(|&(_, &sum)| FloatOrd(sum))
        .map(|(ix, _)| ix)
}

/// Defines which cells surrounding a cell influence it and how they are combined.
#[derive(Clone, Debug)]
pub enum Neighborhood {
    Radial(Radial),
    Custom(Custom),
    MultiCustom(MultiCustom),
}

impl Default for Neighborhood {
    fn default() -> Self {
        Neighborhood::Radial(Radial::default())
    }
}

impl From<Radial> for Neighborhood {
    fn from(hood: Radial) -> Self {
        Neighborhood::Radial(hood)
    }
}

impl From<Custom> for Neighborhood {
    fn from(hood: Custom) -> Self {
        Neighborhood::Custom(hood)
    }
}

impl From<MultiCustom> for Neighborhood {
    fn from(hood: MultiCustom) -> Self {
        Neighborhood::MultiCustom(hood)
    }
}

impl Neighborhood {
    /// How neighbors past the edge of the grid are handled.
    pub fn overflow(&self) -> Overflow {
        match self {
            Neighborhood::Radial(hood) => hood.overflow,
            Neighborhood::Custom(hood) => hood.overflow,
            Neighborhood::MultiCustom(hood) => hood.overflow,
        }
    }

    /// Combine the neighbors of the cell being visited.
    #[inline]
    pub fn aggregate<C: State, A: ?Sized>(&self, ctx: &Context<'_, C, A>) -> Aggregate<'_> {
        self.aggregate_at(ctx.source, ctx.index)
    }

    /// Combine the neighbors of the cell at `index` in `source`.
    pub fn aggregate_at<C: State>(&self, source: &Grid<C>, index: &[usize]) -> Aggregate<'_> {
        match self {
            Neighborhood::Radial(hood) => Aggregate::Sum(hood.sum(source, index)),
            Neighborhood::Custom(hood) => Aggregate::Sum(hood.sum(source, index)),
            Neighborhood::MultiCustom(hood) => hood.sum(source, index),
        }
    }

    /// Check this neighborhood against the shape of the grid before any stepping.
    ///
    /// Custom offsets that can never land inside the grid are only warned about.
    pub fn validate(&self, shape: &[usize]) -> Result<(), Error> {
        let axes = match self {
            Neighborhood::Radial(hood) => hood.shape.axes(),
            _ => 2,
        };
        if shape.len() != axes {
            return Err(Error::DimensionMismatch {
                expected: axes,
                found: shape.len(),
            });
        }
        if self.overflow() == Overflow::Wrap {
            if let Some(axis) = shape.iter().position(|&len| len == 0) {
                return Err(Error::InvalidOverflowCoordinate { axis });
            }
            return Ok(());
        }
        let offsets: Box<dyn Iterator<Item = &(isize, isize)>> = match self {
            Neighborhood::Radial(_) => return Ok(()),
            Neighborhood::Custom(hood) => Box::new(hood.offsets.iter()),
            Neighborhood::MultiCustom(hood) => Box::new(hood.groups.iter().flatten()),
        };
        for &(dr, dc) in offsets {
            if dr.unsigned_abs() >= shape[0] || dc.unsigned_abs() >= shape[1] {
                warn!(
                    "neighborhood offset ({}, {}) never lands inside a {}x{} grid and will not contribute",
                    dr, dc, shape[0], shape[1]
                );
            }
        }
        Ok(())
    }
}

/// Sum the cells at 2-D `offsets` from `index`. Cells that cannot be resolved contribute nothing.
#[inline]
fn sum_offsets<C: State>(
    source: &Grid<C>,
    index: &[usize],
    offsets: impl Iterator<Item = (isize, isize)>,
    overflow: Overflow,
) -> f64 {
    let ((rows, cols), row, col) = match (source.shape(), index) {
        (&[rows, cols], &[row, col]) => ((rows, cols), row, col),
        _ => return 0.0,
    };
    offsets
        .filter_map(|(dr, dc)| {
            Some((
                overflow.offset(row, dr, rows)?,
                overflow.offset(col, dc, cols)?,
            ))
        })
        .filter_map(|(r, c)| source.get(&[r, c][..]))
        .map(|&state| state.weight())
        .sum()
}

/// Sum the cells at 1-D `offsets` from `index`.
#[inline]
fn sum_line<C: State>(
    source: &Grid<C>,
    index: &[usize],
    offsets: impl Iterator<Item = isize>,
    overflow: Overflow,
) -> f64 {
    let (len, center) = match (source.shape(), index) {
        (&[len], &[center]) => (len, center),
        _ => return 0.0,
    };
    offsets
        .filter_map(|d| overflow.offset(center, d, len))
        .filter_map(|i| source.get(&[i][..]))
        .map(|&state| state.weight())
        .sum()
}
