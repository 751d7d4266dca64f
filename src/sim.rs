use crate::{sweep, BufferPair, Chain, Error, Grid, Output, State};
use log::{debug, info};
use std::iter::Peekable;
use std::ops::RangeInclusive;
use std::time::Duration;

#[cfg(feature = "persist")]
use serde::{Deserialize, Serialize};

/// Settings for a simulation run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "persist", derive(Serialize, Deserialize), serde(default))]
pub struct SimConfig {
    /// The first timestep.
    pub start: u64,
    /// The last timestep, inclusive.
    pub stop: u64,
    /// Pause between frames, passed on to the output.
    pub pause: Option<Duration>,
    /// Run whole-grid models over the cells in parallel.
    pub parallel: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            start: 1,
            stop: 1000,
            pause: None,
            parallel: false,
        }
    }
}

impl SimConfig {
    /// Every timestep from `start` to `stop`.
    pub fn times(&self) -> RangeInclusive<u64> {
        self.start..=self.stop
    }
}

/// Whether a [`Simulation`] has timesteps left to run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// There are timesteps left to run.
    Pending,
    /// Every timestep has been run.
    Done,
}

type Times = Peekable<Box<dyn Iterator<Item = u64> + Send>>;

fn times(iter: impl Iterator<Item = u64> + Send + 'static) -> Times {
    (Box::new(iter) as Box<dyn Iterator<Item = u64> + Send>).peekable()
}

/// A running simulation: a model chain, the grids it steps and the timesteps left to run.
pub struct Simulation<C, A: ?Sized = ()> {
    chain: Chain<C, A>,
    buffers: BufferPair<C>,
    times: Times,
    pause: Option<Duration>,
    parallel: bool,
}

impl<C, A> Simulation<C, A>
where
    C: State,
    A: Sync + ?Sized,
{
    /// Set up a simulation. The chain is checked against the grid before anything runs.
    pub fn new(
        chain: impl Into<Chain<C, A>>,
        init: Grid<C>,
        config: &SimConfig,
    ) -> Result<Self, Error> {
        let chain = chain.into();
        chain.validate(init.shape())?;
        Ok(Simulation {
            chain,
            buffers: BufferPair::new(init),
            times: times(config.times()),
            pause: config.pause,
            parallel: config.parallel,
        })
    }

    /// Replace the timesteps to run with any ordered sequence.
    pub fn with_times<I>(self, sequence: I) -> Self
    where
        I: IntoIterator<Item = u64>,
        I::IntoIter: Send + 'static,
    {
        Simulation {
            times: self::times(sequence.into_iter()),
            ..self
        }
    }

    pub fn status(&mut self) -> Status {
        match self.times.peek() {
            Some(_) => Status::Pending,
            None => Status::Done,
        }
    }

    /// The timestep the next call to [`Simulation::step`] will run.
    pub fn next_time(&mut self) -> Option<u64> {
        self.times.peek().copied()
    }

    /// The grid produced by the last timestep, or the initial grid.
    pub fn frame(&self) -> &Grid<C> {
        self.buffers.latest()
    }

    /// Consume the simulation, returning its latest grid.
    pub fn into_frame(self) -> Grid<C> {
        self.buffers.into_latest()
    }

    /// Run a single timestep and hand the new frame to `output`.
    ///
    /// Returns the timestep that ran, or `None` once every timestep has been run.
    pub fn step<O>(&mut self, output: &mut O, args: &A) -> Result<Option<u64>, Error>
    where
        O: Output<C> + ?Sized,
    {
        let t = match self.times.next() {
            Some(t) => t,
            None => return Ok(None),
        };
        debug!("stepping timestep {}", t);
        sweep(&self.chain, &mut self.buffers, t, args, self.parallel)?;
        output.update(self.buffers.latest(), t, self.pause);
        Ok(Some(t))
    }

    /// Run every remaining timestep.
    pub fn run<O>(&mut self, output: &mut O, args: &A) -> Result<(), Error>
    where
        O: Output<C> + ?Sized,
    {
        info!(
            "running {} model(s) on a {:?} grid",
            self.chain.len(),
            self.buffers.shape()
        );
        let mut steps = 0u64;
        while self.step(output, args)?.is_some() {
            steps += 1;
        }
        info!("simulation finished after {} timesteps", steps);
        Ok(())
    }
}

/// Run a whole simulation, passing every frame to `output`.
///
/// `args` is passed to every rule call untouched. Returns the final grid.
pub fn sim<C, A, O>(
    output: &mut O,
    chain: impl Into<Chain<C, A>>,
    init: Grid<C>,
    args: &A,
    config: &SimConfig,
) -> Result<Grid<C>, Error>
where
    C: State,
    A: Sync + ?Sized,
    O: Output<C> + ?Sized,
{
    let mut simulation = Simulation::new(chain, init, config)?;
    simulation.run(output, args)?;
    Ok(simulation.into_frame())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArrayOutput, BoxError, Context, Model, Rule};
    use ndarray::arr1;

    struct Count;

    impl Rule<u64, ()> for Count {
        fn rule(&self, ctx: &Context<'_, u64, ()>) -> Result<u64, BoxError> {
            Ok(ctx.state + 1)
        }
    }

    struct StampTime;

    impl Rule<u64, ()> for StampTime {
        fn rule(&self, ctx: &Context<'_, u64, ()>) -> Result<u64, BoxError> {
            if ctx.t == 4 {
                return Err("too late".into());
            }
            Ok(ctx.t)
        }
    }

    #[test]
    fn steps_until_done() {
        let config = SimConfig {
            start: 1,
            stop: 3,
            ..SimConfig::default()
        };
        let init = arr1(&[0u64, 5]).into_dyn();
        let mut output = ArrayOutput::new(&init);
        let mut simulation = Simulation::new(Model::whole(Count), init, &config).unwrap();
        assert_eq!(simulation.status(), Status::Pending);
        assert_eq!(simulation.next_time(), Some(1));
        assert_eq!(simulation.step(&mut output, &()).unwrap(), Some(1));
        simulation.run(&mut output, &()).unwrap();
        assert_eq!(simulation.status(), Status::Done);
        assert_eq!(simulation.step(&mut output, &()).unwrap(), None);
        assert_eq!(output.frames().len(), 4);
        assert_eq!(simulation.frame(), &arr1(&[3u64, 8]).into_dyn());
    }

    #[test]
    fn custom_times_and_pause_reach_the_output() {
        let config = SimConfig {
            pause: Some(Duration::from_millis(5)),
            ..SimConfig::default()
        };
        let mut seen = Vec::new();
        let mut output = |frame: &Grid<u64>, t: u64, pause: Option<Duration>| {
            seen.push((t, frame[&[0][..]], pause));
        };
        Simulation::new(Model::whole(StampTime), arr1(&[0u64]).into_dyn(), &config)
            .unwrap()
            .with_times(vec![10, 20, 30])
            .run(&mut output, &())
            .unwrap();
        let pause = Some(Duration::from_millis(5));
        assert_eq!(seen, vec![(10, 10, pause), (20, 20, pause), (30, 30, pause)]);
    }

    #[test]
    fn rule_errors_abort_the_run() {
        let mut output = ArrayOutput::new(&arr1(&[0u64]).into_dyn());
        let result = sim(
            &mut output,
            Model::whole(StampTime),
            arr1(&[0u64]).into_dyn(),
            &(),
            &SimConfig::default(),
        );
        match result {
            Err(Error::Rule { t, .. }) => assert_eq!(t, 4),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(output.frames().len(), 4);
    }

    #[test]
    fn default_config() {
        let config = SimConfig::default();
        assert_eq!(config.times(), 1..=1000);
        assert_eq!(config.pause, None);
        assert!(!config.parallel);
    }
}
