use crate::Grid;
use std::time::Duration;

#[cfg(feature = "persist")]
use crate::Error;
#[cfg(feature = "persist")]
use serde::{de::DeserializeOwned, Serialize};
#[cfg(feature = "persist")]
use std::io::{Read, Write};

/// Receives every frame of a simulation.
///
/// Outputs are decoupled from the simulation itself, so storing frames and showing them
/// can be swapped freely.
pub trait Output<C> {
    /// Called once per timestep with the grid that was just produced.
    ///
    /// `pause` is the time the caller would like between frames. It only affects playback.
    fn update(&mut self, frame: &Grid<C>, t: u64, pause: Option<Duration>);
}

impl<C, F> Output<C> for F
where
    F: FnMut(&Grid<C>, u64, Option<Duration>),
{
    fn update(&mut self, frame: &Grid<C>, t: u64, pause: Option<Duration>) {
        self(frame, t, pause)
    }
}

/// Stores every frame of the simulation, starting with the initial grid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrayOutput<C> {
    frames: Vec<Grid<C>>,
}

impl<C: Clone> ArrayOutput<C> {
    /// Start storing frames with a copy of the initial grid.
    pub fn new(init: &Grid<C>) -> Self {
        ArrayOutput {
            frames: vec![init.clone()],
        }
    }

    /// Every stored frame, the initial grid first.
    pub fn frames(&self) -> &[Grid<C>] {
        &self.frames
    }

    pub fn last(&self) -> Option<&Grid<C>> {
        self.frames.last()
    }

    pub fn into_frames(self) -> Vec<Grid<C>> {
        self.frames
    }
}

impl<C: Clone> Output<C> for ArrayOutput<C> {
    fn update(&mut self, frame: &Grid<C>, _: u64, _: Option<Duration>) {
        self.frames.push(frame.clone());
    }
}

#[cfg(feature = "persist")]
impl<C> ArrayOutput<C>
where
    C: Serialize + DeserializeOwned,
{
    /// Write all stored frames with bincode.
    pub fn save<W: Write>(&self, writer: W) -> Result<(), Error> {
        bincode::serialize_into(writer, &self.frames)?;
        Ok(())
    }

    /// Read frames written by [`ArrayOutput::save`].
    pub fn load<R: Read>(reader: R) -> Result<Self, Error> {
        Ok(ArrayOutput {
            frames: bincode::deserialize_from(reader)?,
        })
    }
}

/// Sleeps for the requested pause before handing each frame to the wrapped output.
#[derive(Clone, Debug, Default)]
pub struct Paced<O>(pub O);

impl<C, O: Output<C>> Output<C> for Paced<O> {
    fn update(&mut self, frame: &Grid<C>, t: u64, pause: Option<Duration>) {
        if let Some(pause) = pause {
            std::thread::sleep(pause);
        }
        self.0.update(frame, t, pause);
    }
}
