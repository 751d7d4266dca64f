use thiserror::Error;

/// Errors returned by user rule code. They are carried unchanged inside [`Error::Rule`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong while setting up or running a simulation.
#[derive(Debug, Error)]
pub enum Error {
    /// A simulation was started with a chain that has no models.
    #[error("a simulation needs at least one model")]
    EmptyChain,

    /// The grid does not have the exact shape a model was built for.
    ///
    /// The built-in models never return this. It is meant for the `validate` method of
    /// user-defined rules that only work on one grid size.
    #[error("grid has shape {found:?}, but a model expects {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// The grid has a different number of axes than the neighborhood works on.
    #[error("neighborhood needs a grid with {expected} axes, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A radial neighborhood was given a radius of 0.
    #[error("neighborhood radius must be at least 1")]
    InvalidRadius,

    /// Wrapping was requested around an axis with no cells on it.
    #[error("cannot wrap coordinates around axis {axis}, which has length 0")]
    InvalidOverflowCoordinate { axis: usize },

    /// A shape name did not match any [`Shape`](crate::Shape).
    #[error("unknown neighborhood shape {0:?}")]
    UnknownShape(String),

    /// A life rule could not be parsed from a string.
    #[error("invalid rulestring {0:?}, expected something like \"B3/S23\"")]
    InvalidRulestring(String),

    /// A rule returned an error while visiting the cell at `index` on timestep `t`.
    #[error("rule failed at cell {index:?} on timestep {t}")]
    Rule {
        t: u64,
        index: Vec<usize>,
        #[source]
        source: BoxError,
    },

    /// Saving or loading frames failed.
    #[cfg(feature = "persist")]
    #[error(transparent)]
    Persist(#[from] bincode::Error),
}
