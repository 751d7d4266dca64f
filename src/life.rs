use crate::{BoxError, Context, Error, Neighborhood, Rule, State};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Game-of-life style cellular automata.
///
/// An empty cell becomes active if its number of active neighbors is in `birth`, and an
/// active cell stays active if the number is in `survival`. Everything else becomes empty.
#[derive(Clone, Debug)]
pub struct Life {
    neighborhood: Neighborhood,
    birth: BTreeSet<usize>,
    survival: BTreeSet<usize>,
}

impl Default for Life {
    /// Conway's Game of Life (B3/S23) on a radius 1 Moore neighborhood.
    fn default() -> Self {
        Life::new(vec![3], vec![2, 3])
    }
}

impl Life {
    pub fn new(
        birth: impl IntoIterator<Item = usize>,
        survival: impl IntoIterator<Item = usize>,
    ) -> Self {
        Life {
            neighborhood: Neighborhood::default(),
            birth: birth.into_iter().collect(),
            survival: survival.into_iter().collect(),
        }
    }

    /// Replace the neighborhood used to count neighbors.
    pub fn with_neighborhood(self, neighborhood: impl Into<Neighborhood>) -> Self {
        Life {
            neighborhood: neighborhood.into(),
            ..self
        }
    }

    pub fn life() -> Self {
        Life::default()
    }

    pub fn morley() -> Self {
        Life::new(vec![3, 6, 8], vec![2, 4, 5])
    }

    pub fn two_by_two() -> Self {
        Life::new(vec![3, 6], vec![1, 2, 5])
    }

    pub fn dimoeba() -> Self {
        Life::new(vec![3, 5, 6, 7, 8], vec![5, 6, 7, 8])
    }

    pub fn no_death() -> Self {
        Life::new(vec![3], 0..=8)
    }

    pub fn thirty_four() -> Self {
        Life::new(vec![3, 4], vec![3, 4])
    }

    pub fn replicator() -> Self {
        Life::new(vec![1, 3, 5, 7], vec![1, 3, 5, 7])
    }

    pub fn neighborhood(&self) -> &Neighborhood {
        &self.neighborhood
    }

    pub fn birth(&self) -> &BTreeSet<usize> {
        &self.birth
    }

    pub fn survival(&self) -> &BTreeSet<usize> {
        &self.survival
    }

    /// The next state of a cell given whether it is active and its neighbor sum.
    pub fn next<C: State>(&self, state: C, neighbors: f64) -> C {
        let counts = if state.is_active() {
            &self.survival
        } else {
            &self.birth
        };
        let count = neighbors.round();
        if count >= 0.0 && counts.contains(&(count as usize)) {
            C::active()
        } else {
            C::default()
        }
    }
}

impl<C: State, A: ?Sized> Rule<C, A> for Life {
    fn rule(&self, ctx: &Context<'_, C, A>) -> Result<C, BoxError> {
        let neighbors = self.neighborhood.aggregate(ctx).total();
        Ok(self.next(ctx.state, neighbors))
    }

    fn validate(&self, shape: &[usize]) -> Result<(), Error> {
        self.neighborhood.validate(shape)
    }
}

fn write_counts(f: &mut fmt::Formatter<'_>, counts: &BTreeSet<usize>) -> fmt::Result {
    if counts.iter().all(|&n| n < 10) {
        write!(f, "{}", counts.iter().join(""))
    } else {
        write!(f, "{}", counts.iter().join(","))
    }
}

impl fmt::Display for Life {
    /// Writes the rulestring, such as `B3/S23`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("B")?;
        write_counts(f, &self.birth)?;
        f.write_str("/S")?;
        write_counts(f, &self.survival)
    }
}

fn parse_counts(counts: &str) -> Option<BTreeSet<usize>> {
    if counts.contains(',') {
        counts.split(',').map(|n| n.trim().parse().ok()).collect()
    } else {
        counts
            .chars()
            .map(|c| c.to_digit(10).map(|n| n as usize))
            .collect()
    }
}

impl FromStr for Life {
    type Err = Error;

    /// Parses a `B.../S...` rulestring. The neighborhood is the default one.
    fn from_str(s: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidRulestring(s.to_owned());
        let (birth, survival) = s.trim().split('/').collect_tuple().ok_or_else(invalid)?;
        let strip = |part: &str, prefix: char| {
            let mut chars = part.chars();
            match chars.next() {
                Some(c) if c.eq_ignore_ascii_case(&prefix) => parse_counts(chars.as_str()),
                _ => None,
            }
        };
        Ok(Life {
            neighborhood: Neighborhood::default(),
            birth: strip(birth, 'B').ok_or_else(invalid)?,
            survival: strip(survival, 'S').ok_or_else(invalid)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Overflow, Radial};
    use ndarray::Array2;

    #[test]
    fn conway_counts() {
        let life = Life::default();
        assert!(life.next(false, 3.0));
        assert!(!life.next(false, 2.0));
        assert!(life.next(true, 2.0));
        assert!(life.next(true, 3.0));
        assert!(!life.next(true, 4.0));
        assert_eq!(life.next(1u8, 1.0), 0);
        assert_eq!(life.next(0i32, 3.0), 1);
    }

    #[test]
    fn isolated_cell_dies() {
        let grid = Array2::from_shape_fn((3, 3), |pos| pos == (1, 1)).into_dyn();
        let life = Life::default().with_neighborhood(Radial::moore(Overflow::Wrap));
        let ctx = Context {
            state: true,
            index: &[1, 1],
            t: 1,
            source: &grid,
            args: &(),
        };
        assert!(!Rule::<bool, ()>::rule(&life, &ctx).unwrap());
    }

    #[test]
    fn rulestrings() {
        let life: Life = "B36/S23".parse().unwrap();
        assert_eq!(life.birth().iter().copied().collect::<Vec<_>>(), vec![3, 6]);
        assert_eq!(life.survival().iter().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(Life::morley().to_string(), "B368/S245");
        assert_eq!(Life::no_death().to_string(), "B3/S012345678");
        assert_eq!("b3/s".parse::<Life>().unwrap().to_string(), "B3/S");
        let wide = Life::new(vec![3, 12], vec![10]);
        assert_eq!(wide.to_string(), "B3,12/S10");
        let parsed: Life = wide.to_string().parse().unwrap();
        assert_eq!(parsed.birth(), wide.birth());
        assert_eq!(parsed.survival(), wide.survival());
    }

    #[test]
    fn bad_rulestrings() {
        for s in &["", "B3", "S23/B3", "B3/S2x", "B3/S23/C2"] {
            assert!(
                matches!(s.parse::<Life>(), Err(Error::InvalidRulestring(_))),
                "{:?} should not parse",
                s
            );
        }
    }
}
