use std::borrow::Cow;
use std::default::Default;
use std::io::{BufWriter, Error, ErrorKind, Write};

use ptree::print_config::UTF_CHARS;
use ptree::{write_tree_with, PrintConfig, Style, TreeItem};

use crate::plan::{Plan, PlanNode};

impl<'a> TreeItem for &'a PlanNode {
    type Child = Self;

    fn write_self<W: Write>(&self, f: &mut W, style: &Style) -> std::io::Result<()> {
        write!(f, "{}", style.paint(*self))
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(
            self.inputs()
                .iter()
                .map(|c| &**c)
                .collect::<Vec<&'a PlanNode>>(),
        )
    }
}

pub fn explain<W: Write>(plan: &Plan, output: &mut W) -> std::io::Result<()> {
    let config = PrintConfig {
        indent: 3,
        characters: UTF_CHARS.into(),
        ..Default::default()
    };
    write_tree_with(&&*plan.root, output, &config)
}

pub fn explain_to_string(plan: &Plan) -> std::io::Result<String> {
    let mut buf = BufWriter::new(Vec::new());

    explain(plan, &mut buf)?;

    let bytes = buf.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| Error::new(ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion_common::JoinType;
    use datafusion_expr::lit;

    use crate::plan::explain::explain_to_string;
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::Convention;
    use crate::test_utils::{t1_schema, t2_schema};

    #[test]
    fn test_explain_logical_plan() {
        let plan = LogicalPlanBuilder::new()
            .scan("t1", t1_schema())
            .unwrap()
            .limit(5)
            .unwrap()
            .limit(10)
            .unwrap()
            .build()
            .unwrap();

        let expected_result = "\
Limit.NONE(limit=10)
└─ Limit.NONE(limit=5)
   └─ TableScan.NONE(table=t1)
";

        let result = explain_to_string(&plan).unwrap();

        assert_eq!(expected_result, result);
    }

    #[test]
    fn test_explain_join() {
        let plan = {
            let right = LogicalPlanBuilder::new()
                .with_convention(Convention::new("PHYSICAL"))
                .scan("t2", t2_schema())
                .unwrap()
                .root()
                .unwrap();

            LogicalPlanBuilder::new()
                .with_convention(Convention::new("PHYSICAL"))
                .scan("t1", t1_schema())
                .unwrap()
                .join(JoinType::Inner, lit(true), Arc::clone(&right))
                .unwrap()
                .build()
                .unwrap()
        };

        let expected_result = "\
Join.PHYSICAL(type=Inner, condition=Boolean(true))
├─ TableScan.PHYSICAL(table=t1)
└─ TableScan.PHYSICAL(table=t2)
";
        let result = explain_to_string(&plan).unwrap();
        assert_eq!(expected_result, result);
    }
}
