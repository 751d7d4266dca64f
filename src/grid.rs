use crate::{Chain, Context, Error, Grid, Model, PartialRule, Rule, State};
use log::trace;
use ndarray::{Dimension, IxDyn};
use rayon::iter::IndexedParallelIterator;
use rayon::iter::IntoParallelRefMutIterator;
use rayon::iter::ParallelIterator;
use std::mem::swap;

/// The source and destination grids of a simulation.
///
/// Rules only ever read `source` and write `dest`. Once a sweep is done the two are
/// swapped, so the freshly written grid becomes the source of the next sweep.
#[derive(Clone, Debug)]
pub struct BufferPair<C> {
    source: Grid<C>,
    dest: Grid<C>,
}

impl<C: State> BufferPair<C> {
    /// Make a buffer pair from an initial grid, allocating a destination of the same shape.
    pub fn new(init: Grid<C>) -> Self {
        let source = if init.is_standard_layout() {
            init
        } else {
            init.as_standard_layout().into_owned()
        };
        let dest = Grid::default(source.raw_dim());
        BufferPair { source, dest }
    }

    /// The most recently written grid.
    #[inline]
    pub fn latest(&self) -> &Grid<C> {
        &self.source
    }

    #[inline]
    pub fn source(&self) -> &Grid<C> {
        &self.source
    }

    #[inline]
    pub fn dest(&self) -> &Grid<C> {
        &self.dest
    }

    pub fn shape(&self) -> &[usize] {
        self.source.shape()
    }

    /// Swap the roles of the two grids without copying any cells.
    #[inline]
    pub fn swap(&mut self) {
        swap(&mut self.source, &mut self.dest);
    }

    pub fn into_latest(self) -> Grid<C> {
        self.source
    }
}

/// Run every model of the chain over the whole grid once, for timestep `t`.
///
/// Each model reads the grid written by the model before it. When this returns
/// [`BufferPair::latest`] holds the result of the last model.
///
/// With `parallel` set whole-grid models are run over the cells in parallel. Partial
/// models may write anywhere in the destination, so they always run in order.
pub fn sweep<C, A>(
    chain: &Chain<C, A>,
    buffers: &mut BufferPair<C>,
    t: u64,
    args: &A,
    parallel: bool,
) -> Result<(), Error>
where
    C: State,
    A: Sync + ?Sized,
{
    for (ix, model) in chain.models().iter().enumerate() {
        trace!("timestep {}: sweeping model {} ({:?})", t, ix, model);
        match model {
            Model::Whole(rule) if parallel => sweep_whole_parallel(&**rule, buffers, t, args)?,
            Model::Whole(rule) => sweep_whole(&**rule, buffers, t, args)?,
            Model::Partial(rule) => sweep_partial(&**rule, buffers, t, args)?,
        }
        buffers.swap();
    }
    Ok(())
}

fn rule_error(t: u64, index: &[usize], source: crate::BoxError) -> Error {
    Error::Rule {
        t,
        index: index.to_vec(),
        source,
    }
}

fn sweep_whole<C, A>(
    rule: &dyn Rule<C, A>,
    buffers: &mut BufferPair<C>,
    t: u64,
    args: &A,
) -> Result<(), Error>
where
    C: State,
    A: ?Sized,
{
    let BufferPair { source, dest } = buffers;
    for ((index, &state), cell) in source.indexed_iter().zip(dest.iter_mut()) {
        let index = index.slice();
        let ctx = Context {
            state,
            index,
            t,
            source: &*source,
            args,
        };
        *cell = rule.rule(&ctx).map_err(|e| rule_error(t, index, e))?;
    }
    Ok(())
}

/// Turn a row-major offset into an index.
fn unravel(mut flat: usize, shape: &[usize]) -> IxDyn {
    let mut index = IxDyn::zeros(shape.len());
    for (axis, &len) in shape.iter().enumerate().rev() {
        index[axis] = flat % len;
        flat /= len;
    }
    index
}

fn sweep_whole_parallel<C, A>(
    rule: &dyn Rule<C, A>,
    buffers: &mut BufferPair<C>,
    t: u64,
    args: &A,
) -> Result<(), Error>
where
    C: State,
    A: Sync + ?Sized,
{
    if !buffers.source.is_standard_layout() || !buffers.dest.is_standard_layout() {
        return sweep_whole(rule, buffers, t, args);
    }
    let BufferPair { source, dest } = buffers;
    let source = &*source;
    let shape = source.shape();
    // Both buffers are in standard layout, so a flat offset means the same cell in each.
    let states = source.as_slice().unwrap_or_default();
    let cells = dest.as_slice_mut().unwrap_or_default();
    cells
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(flat, cell)| -> Result<(), Error> {
            let index = unravel(flat, shape);
            let ctx = Context {
                state: states[flat],
                index: index.slice(),
                t,
                source,
                args,
            };
            *cell = rule
                .rule(&ctx)
                .map_err(|e| rule_error(t, index.slice(), e))?;
            Ok(())
        })
}

fn sweep_partial<C, A>(
    rule: &dyn PartialRule<C, A>,
    buffers: &mut BufferPair<C>,
    t: u64,
    args: &A,
) -> Result<(), Error>
where
    C: State,
    A: ?Sized,
{
    let BufferPair { source, dest } = buffers;
    dest.fill(rule.neutral());
    let mut dest = dest.view_mut();
    for (index, &state) in source.indexed_iter() {
        let index = index.slice();
        let ctx = Context {
            state,
            index,
            t,
            source: &*source,
            args,
        };
        rule.rule(&ctx, &mut dest).map_err(|e| rule_error(t, index, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxError;
    use ndarray::{arr1, arr2, ArrayViewMutD};

    /// Every cell takes the value of its left neighbor, wrapping around.
    struct ShiftRight;

    impl Rule<u8, ()> for ShiftRight {
        fn rule(&self, ctx: &Context<'_, u8, ()>) -> Result<u8, BoxError> {
            let len = ctx.source.len();
            Ok(ctx.source[&[(ctx.index[0] + len - 1) % len][..]])
        }
    }

    /// Every active cell moves one cell right, off the edge if there is no room.
    struct Mover;

    impl PartialRule<u8, ()> for Mover {
        fn rule(
            &self,
            ctx: &Context<'_, u8, ()>,
            dest: &mut ArrayViewMutD<'_, u8>,
        ) -> Result<(), BoxError> {
            if ctx.state != 0 {
                if let Some(cell) = dest.get_mut(&[ctx.index[0] + 1][..]) {
                    *cell = ctx.state;
                }
            }
            Ok(())
        }
    }

    struct Offset(u8);

    impl Rule<u8, u8> for Offset {
        fn rule(&self, ctx: &Context<'_, u8, u8>) -> Result<u8, BoxError> {
            Ok(ctx.state + self.0 + *ctx.args)
        }
    }

    struct FailAt(usize);

    impl Rule<u8, ()> for FailAt {
        fn rule(&self, ctx: &Context<'_, u8, ()>) -> Result<u8, BoxError> {
            if ctx.index[1] == self.0 {
                Err("boom".into())
            } else {
                Ok(ctx.state)
            }
        }
    }

    #[test]
    fn swap_does_not_copy() {
        let mut buffers = BufferPair::new(arr1(&[1u8, 2, 3]).into_dyn());
        assert_eq!(buffers.dest(), &arr1(&[0u8, 0, 0]).into_dyn());
        let before = buffers.source().as_ptr();
        buffers.swap();
        assert_eq!(buffers.dest().as_ptr(), before);
        assert_eq!(buffers.latest(), &arr1(&[0u8, 0, 0]).into_dyn());
    }

    #[test]
    fn rules_only_see_the_old_grid() {
        let chain = Chain::from(Model::whole(ShiftRight));
        let mut buffers = BufferPair::new(arr1(&[1u8, 2, 3, 4]).into_dyn());
        sweep(&chain, &mut buffers, 1, &(), false).unwrap();
        assert_eq!(buffers.latest(), &arr1(&[4u8, 1, 2, 3]).into_dyn());
    }

    #[test]
    fn parallel_matches_sequential() {
        let chain = Chain::from(Model::whole(ShiftRight));
        let init = arr1(&(0..200).map(|n| n as u8).collect::<Vec<_>>()).into_dyn();
        let mut sequential = BufferPair::new(init.clone());
        let mut parallel = BufferPair::new(init);
        for t in 1..=5 {
            sweep(&chain, &mut sequential, t, &(), false).unwrap();
            sweep(&chain, &mut parallel, t, &(), true).unwrap();
        }
        assert_eq!(sequential.latest(), parallel.latest());
    }

    #[test]
    fn partial_models_start_from_neutral() {
        let chain = Chain::from(Model::partial(Mover));
        let mut buffers = BufferPair::new(arr1(&[7u8, 0, 5]).into_dyn());
        sweep(&chain, &mut buffers, 1, &(), false).unwrap();
        assert_eq!(buffers.latest(), &arr1(&[0u8, 7, 0]).into_dyn());
        // The stale destination holds [7, 0, 5]; none of it may survive the reset.
        sweep(&chain, &mut buffers, 2, &(), false).unwrap();
        assert_eq!(buffers.latest(), &arr1(&[0u8, 0, 7]).into_dyn());
    }

    #[test]
    fn chained_models_feed_each_other() {
        let chain: Chain<u8, u8> = vec![Model::whole(Offset(1)), Model::whole(Offset(10))].into();
        let mut buffers = BufferPair::new(arr2(&[[0u8, 1], [2, 3]]).into_dyn());
        sweep(&chain, &mut buffers, 1, &1, true).unwrap();
        assert_eq!(buffers.latest(), &arr2(&[[13u8, 14], [15, 16]]).into_dyn());
    }

    #[test]
    fn rule_errors_carry_the_cell() {
        let chain = Chain::from(Model::whole(FailAt(1)));
        for &parallel in &[false, true] {
            let mut buffers = BufferPair::new(arr2(&[[0u8, 0]]).into_dyn());
            match sweep(&chain, &mut buffers, 3, &(), parallel) {
                Err(Error::Rule { t, index, source }) => {
                    assert_eq!(t, 3);
                    assert_eq!(index, vec![0, 1]);
                    assert_eq!(source.to_string(), "boom");
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn unravel_row_major() {
        assert_eq!(unravel(0, &[2, 3]).slice(), &[0, 0]);
        assert_eq!(unravel(4, &[2, 3]).slice(), &[1, 1]);
        assert_eq!(unravel(5, &[2, 3]).slice(), &[1, 2]);
        assert_eq!(unravel(3, &[4]).slice(), &[3]);
    }

    #[test]
    fn non_standard_layout_is_copied() {
        let init = arr2(&[[1u8, 2], [3, 4]]).reversed_axes().into_dyn();
        let buffers = BufferPair::new(init);
        assert!(buffers.source().is_standard_layout());
        assert_eq!(buffers.source(), &arr2(&[[1u8, 3], [2, 4]]).into_dyn());
    }
}
