use crate::Evaluator;
use crate::agent::Walker;
use crate::config::SimParams;
use crate::error::Result;

/// Advances a walker by one fixed interval and scores it by head x.
#[derive(Clone, Debug, Default)]
pub struct IntervalEvaluator {
    params: SimParams,
}

impl IntervalEvaluator {
    pub fn new(params: SimParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }
}

impl Evaluator for IntervalEvaluator {
    fn simulate(&self, walker: &mut Walker) -> Result<()> {
        walker.advance(&self.params)
    }

    /// Absolute head x, not displacement since the walker's own start: a
    /// rebuilt child starts wherever its parent's lineage left off.
    fn fitness(&self, walker: &Walker) -> f32 {
        walker.fitness()
    }
}
