use crate::store::Direction;
use std::fmt;
use std::time::Duration;

/// Call counts and cumulative wall time for one evaluation direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalCounter {
    pub evals: u64,
    pub total_time: Duration,
}

impl EvalCounter {
    pub fn record(&mut self, elapsed: Duration) {
        self.evals += 1;
        self.total_time += elapsed;
    }

    /// Mean wall time per call, `None` before the first call.
    pub fn average(&self) -> Option<Duration> {
        match u32::try_from(self.evals) {
            Ok(0) => None,
            Ok(n) => Some(self.total_time / n),
            Err(_) => Some(self.total_time.div_f64(self.evals as f64)),
        }
    }
}

/// Instrumentation of one graph instance, reset only by reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    pub forward: EvalCounter,
    pub adjoint: EvalCounter,
}

impl EvalStats {
    pub fn counter(&self, direction: Direction) -> &EvalCounter {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Adjoint => &self.adjoint,
        }
    }

    pub fn record(&mut self, direction: Direction, elapsed: Duration) {
        match direction {
            Direction::Forward => self.forward.record(elapsed),
            Direction::Adjoint => self.adjoint.record(elapsed),
        }
    }

    pub fn average(&self, direction: Direction) -> Option<Duration> {
        self.counter(direction).average()
    }

    pub fn report(&self) -> StatsReport<'_> {
        StatsReport { stats: self }
    }
}

/// Two-line human readable summary, one line per direction.
pub struct StatsReport<'a> {
    stats: &'a EvalStats,
}

impl fmt::Display for StatsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, direction) in [Direction::Forward, Direction::Adjoint].into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let counter = self.stats.counter(direction);
            match counter.average() {
                Some(avg) => write!(
                    f,
                    "{d}_evals={}, avg_{d}_eval_time={:e}",
                    counter.evals,
                    avg.as_secs_f64(),
                    d = direction
                )?,
                None => write!(f, "{}_evals=0, no evaluations performed", direction)?,
            }
        }
        Ok(())
    }
}
