use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cost::{Cost, CostModel};
use crate::error::OptResult;
use crate::operator::OperatorTrait;
use crate::plan::{Plan, PlanNodeRef};
use crate::properties::TraitSet;

/// Context for optimization, shared with rules.
#[derive(Clone, Debug, Default)]
pub struct OptimizerContext {
    cancel: Arc<AtomicBool>,
}

impl OptimizerContext {
    /// Uses a cancellation flag owned by the caller.
    pub fn with_cancel_flag(cancel: Arc<AtomicBool>) -> Self {
        Self { cancel }
    }

    /// Long running rules may poll this and give up early.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Optimizer interface.
///
/// All information required by optimizer, such as rule set, input plan, required traits are
/// passed in when building an optimizer, since different optimizers may require different
/// information. Rules only see an optimizer through this trait.
///
/// Expressions handed to rules may contain placeholders standing for expressions the optimizer
/// stores elsewhere, [`Optimizer::resolve`] maps them back.
pub trait Optimizer {
    fn context(&self) -> &OptimizerContext;

    fn cost_model(&self) -> &dyn CostModel;

    /// Current expression behind a placeholder, or `node` itself.
    fn resolve(&self, node: &PlanNodeRef) -> PlanNodeRef;

    fn row_count(&self, node: &PlanNodeRef) -> f64 {
        let node = self.resolve(node);
        let input_rows = node
            .inputs()
            .iter()
            .map(|input| self.row_count(input))
            .collect::<Vec<f64>>();
        node.operator().estimate_row_count(&input_rows)
    }

    /// Self cost of `node` plus cumulative cost of its inputs.
    fn cumulative_cost(&self, node: &PlanNodeRef) -> Cost {
        let node = self.resolve(node);
        let input_rows = node
            .inputs()
            .iter()
            .map(|input| self.row_count(input))
            .collect::<Vec<f64>>();
        let rows = node.operator().estimate_row_count(&input_rows);
        let self_cost = self.cost_model().self_cost(&node, rows, &input_rows);

        node.inputs().iter().fold(self_cost, |cost, input| {
            cost.plus(&self.cumulative_cost(input))
        })
    }

    /// Builds a chain of converters taking `node` to `traits`.
    ///
    /// Returns `None` if some dimension can't be converted.
    fn change_traits_using_converters(
        &self,
        node: &PlanNodeRef,
        traits: &TraitSet,
    ) -> OptResult<Option<PlanNodeRef>>;

    /// Entry point to drive optimization process.
    fn find_best_plan(self) -> OptResult<Plan>
    where
        Self: Sized;
}
