use crate::cost::{Cost, CostModel};
use crate::operator::Operator;
use crate::plan::PlanNode;

/// Default cost model, pricing each operator roughly by the rows it touches.
#[derive(Debug, Default, Clone)]
pub struct VolcanoCostModel {}

impl CostModel for VolcanoCostModel {
    fn self_cost(&self, node: &PlanNode, rows: f64, input_rows: &[f64]) -> Cost {
        let total_input_rows: f64 = input_rows.iter().sum();
        match node.operator() {
            Operator::TableScan(_) => self.make_cost(rows, rows + 1.0, 0.0),
            Operator::Filter(_) => self.make_cost(rows, total_input_rows, 0.0),
            Operator::Projection(projection) => {
                self.make_cost(rows, rows * projection.exprs().len() as f64, 0.0)
            }
            Operator::Join(_) => self.make_cost(rows, total_input_rows, 0.0),
            Operator::Aggregate(aggregate) => {
                let multiplier = 1.0 + aggregate.calls().len() as f64 * 0.125;
                self.make_cost(rows * multiplier, 0.0, 0.0)
            }
            Operator::Sort(sort) => {
                if sort.collation().is_empty() {
                    self.make_cost(rows, 0.0, 0.0)
                } else {
                    let input = total_input_rows.max(1.0);
                    self.make_cost(rows, input * input.log2().max(1.0), 0.0)
                }
            }
            Operator::Limit(_) => self.make_cost(rows, rows, 0.0),
            Operator::SetOp(_) => self.make_cost(rows, total_input_rows, 0.0),
            Operator::Values(_) => self.make_cost(rows, 1.0, 0.0),
            Operator::TableModify(_) => self.make_cost(rows, rows, 0.0),
            Operator::Converter(_) => self.make_cost(total_input_rows, total_input_rows, 0.0),
            Operator::AbstractConverter(_) => self.make_infinite_cost(),
            Operator::Vertex(_) => self.make_zero_cost(),
        }
    }
}
