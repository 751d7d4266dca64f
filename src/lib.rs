//! Gridsim is a library intended to run grid-based simulations.
//!
//! A simulation is built from three pieces:
//!
//! - [`Model`]s hold the configuration for a simulation and carry a rule that is
//!   evaluated for every cell of the grid. Whole-grid models return the new value of
//!   the cell, partial models write into the destination grid themselves.
//! - [`Neighborhood`]s sum up the cells surrounding the current cell, such as the
//!   Moore and von Neumann neighborhoods or arbitrary custom offsets.
//! - [`Overflow`] decides what happens when a neighborhood reaches past the edge of
//!   the grid: it either wraps around or the neighbor is skipped.
//!
//! Frames are handed to an [`Output`] after every timestep.
//!
//! ```
//! use gridsim::{sim, ArrayOutput, Life, SimConfig};
//! use ndarray::Array2;
//!
//! let init = Array2::from_shape_fn((5, 5), |(y, x)| y == 2 && (1..=3).contains(&x)).into_dyn();
//! let mut output = ArrayOutput::new(&init);
//! let config = SimConfig { start: 1, stop: 2, ..SimConfig::default() };
//! sim(&mut output, Life::default(), init, &(), &config).unwrap();
//! assert_eq!(output.frames().len(), 3);
//! assert_eq!(output.frames()[2], output.frames()[0]);
//! ```

mod error;
mod grid;
mod life;
mod model;
mod neighborhood;
mod output;
mod overflow;
mod sim;

pub use error::*;
pub use grid::*;
pub use life::*;
pub use model::*;
pub use neighborhood::*;
pub use output::*;
pub use overflow::*;
pub use sim::*;

/// A grid of cells. One-dimensional simulations use a single axis, everything else two.
pub type Grid<C> = ndarray::ArrayD<C>;

/// The value held by a single cell.
///
/// Neighborhoods sum cells through [`State::weight`], and the neutral value of a cell is
/// its `Default`.
pub trait State: Copy + Default + PartialEq + Send + Sync + 'static {
    /// The numeric value of this state when it is summed by a neighborhood.
    fn weight(self) -> f64;

    /// The canonical active state (`true` or `1`).
    fn active() -> Self;

    /// Any state other than the neutral one is active.
    #[inline]
    fn is_active(self) -> bool {
        self != Self::default()
    }
}

impl State for bool {
    #[inline]
    fn weight(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    #[inline]
    fn active() -> Self {
        true
    }
}

macro_rules! impl_numeric_state {
    ($($t:ty => $one:expr),* $(,)?) => {
        $(
            impl State for $t {
                #[inline]
                fn weight(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn active() -> Self {
                    $one
                }
            }
        )*
    };
}

impl_numeric_state! {
    i8 => 1, i16 => 1, i32 => 1, i64 => 1, isize => 1,
    u8 => 1, u16 => 1, u32 => 1, u64 => 1, usize => 1,
    f32 => 1.0, f64 => 1.0,
}
