use crate::{BoxError, Grid, State};
use ndarray::ArrayViewMutD;
use std::fmt;

/// Everything a rule can see while visiting a single cell.
///
/// This is immutable for the whole sweep: `source` is never written to while rules run.
#[derive(Debug)]
pub struct Context<'a, C, A: ?Sized> {
    /// The value of the current cell in `source`.
    pub state: C,
    /// The index of the current cell, one coordinate per axis.
    pub index: &'a [usize],
    /// The current timestep.
    pub t: u64,
    /// The whole grid as it was before this sweep.
    pub source: &'a Grid<C>,
    /// Extra arguments passed through from the caller of the simulation.
    pub args: &'a A,
}

impl<'a, C, A: ?Sized> Clone for Context<'a, C, A>
where
    C: Copy,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, C, A: ?Sized> Copy for Context<'a, C, A> where C: Copy {}

/// A rule that produces the new value of every cell in the grid.
///
/// The returned value is written to the destination grid at `ctx.index`.
pub trait Rule<C, A: ?Sized>: Send + Sync {
    fn rule(&self, ctx: &Context<'_, C, A>) -> Result<C, BoxError>;

    /// Check that the rule can run on a grid with this shape before any stepping begins.
    fn validate(&self, _shape: &[usize]) -> Result<(), crate::Error> {
        Ok(())
    }
}

/// A rule that writes to the destination grid directly.
///
/// Before the sweep starts the destination is filled with [`PartialRule::neutral`]. The
/// rule may then write to any cell, not just the one it is visiting.
pub trait PartialRule<C, A: ?Sized>: Send + Sync {
    fn rule(&self, ctx: &Context<'_, C, A>, dest: &mut ArrayViewMutD<'_, C>) -> Result<(), BoxError>;

    /// The value every destination cell holds before the sweep.
    fn neutral(&self) -> C
    where
        C: Default,
    {
        C::default()
    }

    /// Check that the rule can run on a grid with this shape before any stepping begins.
    fn validate(&self, _shape: &[usize]) -> Result<(), crate::Error> {
        Ok(())
    }
}

/// A model is either a whole-grid model or a partial model.
pub enum Model<C, A: ?Sized = ()> {
    Whole(Box<dyn Rule<C, A>>),
    Partial(Box<dyn PartialRule<C, A>>),
}

impl<C: State, A: ?Sized> Model<C, A> {
    /// Wrap a rule that returns the new value of each cell.
    pub fn whole(rule: impl Rule<C, A> + 'static) -> Self {
        Model::Whole(Box::new(rule))
    }

    /// Wrap a rule that writes into the destination grid itself.
    pub fn partial(rule: impl PartialRule<C, A> + 'static) -> Self {
        Model::Partial(Box::new(rule))
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Model::Partial(_))
    }

    /// Check the wrapped rule against the shape of the grid.
    pub fn validate(&self, shape: &[usize]) -> Result<(), crate::Error> {
        match self {
            Model::Whole(rule) => rule.validate(shape),
            Model::Partial(rule) => rule.validate(shape),
        }
    }
}

impl<C, A: ?Sized> fmt::Debug for Model<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Whole(_) => f.write_str("Model::Whole(..)"),
            Model::Partial(_) => f.write_str("Model::Partial(..)"),
        }
    }
}

/// Models that run one after the other within a single timestep.
///
/// Every model reads the grid the previous model wrote.
#[derive(Debug)]
pub struct Chain<C, A: ?Sized = ()> {
    models: Vec<Model<C, A>>,
}

impl<C: State, A: ?Sized> Chain<C, A> {
    /// The models in the order they run.
    pub fn models(&self) -> &[Model<C, A>] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Checks the chain against the shape of the grid it will be run on.
    pub fn validate(&self, shape: &[usize]) -> Result<(), crate::Error> {
        if self.models.is_empty() {
            return Err(crate::Error::EmptyChain);
        }
        self.models.iter().try_for_each(|model| model.validate(shape))
    }
}

impl<C, A: ?Sized> From<Model<C, A>> for Chain<C, A> {
    fn from(model: Model<C, A>) -> Self {
        Chain {
            models: vec![model],
        }
    }
}

impl<C, A: ?Sized> From<Vec<Model<C, A>>> for Chain<C, A> {
    fn from(models: Vec<Model<C, A>>) -> Self {
        Chain { models }
    }
}

impl<C: State, A: ?Sized> From<crate::Life> for Model<C, A> {
    fn from(life: crate::Life) -> Self {
        Model::whole(life)
    }
}

impl<C: State, A: ?Sized> From<crate::Life> for Chain<C, A> {
    fn from(life: crate::Life) -> Self {
        Model::from(life).into()
    }
}

impl<C, A: ?Sized> std::iter::FromIterator<Model<C, A>> for Chain<C, A> {
    fn from_iter<I: IntoIterator<Item = Model<C, A>>>(iter: I) -> Self {
        Chain {
            models: iter.into_iter().collect(),
        }
    }
}
