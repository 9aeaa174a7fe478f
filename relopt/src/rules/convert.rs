use std::sync::Arc;

use anyhow::anyhow;

use crate::error::OptResult;
use crate::operator::{Converter, Operator, OperatorKind};
use crate::optimizer::Optimizer;
use crate::plan::{PlanNode, PlanNodeRef};
use crate::properties::Convention;
use crate::rules::{Rule, RuleCall, RuleKind, RuleOperand, RuleRef};

/// Converts `node` into convention `to`, returning `None` if it can't.
pub type ConvertFn =
    fn(&dyn Optimizer, &PlanNodeRef, Convention) -> OptResult<Option<PlanNodeRef>>;

/// Moves expressions from one convention to another.
///
/// A guaranteed converter rule promises to convert any expression in its in convention. Only
/// guaranteed rules take part in building conversion chains, see
/// [`Optimizer::change_traits_using_converters`].
#[derive(Debug)]
pub struct ConverterRule {
    description: String,
    in_convention: Convention,
    out_convention: Convention,
    guaranteed: bool,
    operand: RuleOperand,
    convert_fn: ConvertFn,
}

impl ConverterRule {
    /// `operand` is restricted to expressions in convention `in_convention`.
    pub fn new(
        operand: RuleOperand,
        in_convention: Convention,
        out_convention: Convention,
        guaranteed: bool,
        convert_fn: ConvertFn,
    ) -> Self {
        Self {
            description: format!("ConverterRule(in:{},out:{})", in_convention, out_convention),
            in_convention,
            out_convention,
            guaranteed,
            operand: operand.with_convention(in_convention),
            convert_fn,
        }
    }

    /// Converts any expression by putting a [`Converter`] on top of it.
    pub fn wrapping(in_convention: Convention, out_convention: Convention, guaranteed: bool) -> Self {
        Self::new(
            RuleOperand::any(),
            in_convention,
            out_convention,
            guaranteed,
            wrap_in_converter,
        )
    }

    /// Converts expressions of `kind` by changing their convention in place.
    pub fn retagging(
        kind: OperatorKind,
        in_convention: Convention,
        out_convention: Convention,
        guaranteed: bool,
    ) -> Self {
        Self::new(
            RuleOperand::new(kind),
            in_convention,
            out_convention,
            guaranteed,
            retag,
        )
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn in_convention(&self) -> Convention {
        self.in_convention
    }

    pub fn out_convention(&self) -> Convention {
        self.out_convention
    }

    pub fn is_guaranteed(&self) -> bool {
        self.guaranteed
    }

    pub fn convert(
        &self,
        optimizer: &dyn Optimizer,
        node: &PlanNodeRef,
    ) -> OptResult<Option<PlanNodeRef>> {
        (self.convert_fn)(optimizer, node, self.out_convention)
    }
}

fn wrap_in_converter(
    _optimizer: &dyn Optimizer,
    node: &PlanNodeRef,
    to: Convention,
) -> OptResult<Option<PlanNodeRef>> {
    let converter = Converter::new(node.convention(), to);
    let traits = node.traits().replace(to);
    Ok(Some(Arc::new(PlanNode::new(
        Operator::Converter(converter),
        vec![node.clone()],
        traits,
    )?)))
}

fn retag(
    optimizer: &dyn Optimizer,
    node: &PlanNodeRef,
    to: Convention,
) -> OptResult<Option<PlanNodeRef>> {
    let node = optimizer.resolve(node);
    Ok(Some(Arc::new(
        node.copy_with_traits(node.traits().replace(to)),
    )))
}

impl Rule for ConverterRule {
    fn description(&self) -> &str {
        &self.description
    }

    fn operand(&self) -> &RuleOperand {
        &self.operand
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Converter
    }

    fn on_match(&self, call: &mut RuleCall) -> OptResult<()> {
        let node = call.rel(0).clone();
        if node.traits().contains_convention(self.in_convention) {
            if let Some(converted) = self.convert(call.optimizer(), &node)? {
                call.transform_to(converted);
            }
        }
        Ok(())
    }

    fn as_converter(&self) -> Option<&ConverterRule> {
        Some(self)
    }
}

/// Applies a converter rule to the input of a parent which expects the converted convention.
///
/// Converter rules fire top down, starting from expressions which need converting. This rule
/// does the same bottom up: it matches the parent, and replaces it with a copy over the converted
/// input.
#[derive(Debug)]
pub struct TraitMatchingRule {
    description: String,
    converter: RuleRef,
    operand: RuleOperand,
}

impl TraitMatchingRule {
    pub fn new(converter: RuleRef) -> OptResult<Self> {
        let operand = converter
            .as_converter()
            .map(|c| RuleOperand::any().inputs(vec![c.operand().clone()]))
            .ok_or_else(|| anyhow!("{} is not a converter rule", converter.description()))?;
        Ok(Self {
            description: format!("TraitMatchingRule: {}", converter.description()),
            converter,
            operand,
        })
    }
}

impl Rule for TraitMatchingRule {
    fn description(&self) -> &str {
        &self.description
    }

    fn operand(&self) -> &RuleOperand {
        &self.operand
    }

    fn kind(&self) -> RuleKind {
        RuleKind::TraitMatching
    }

    fn on_match(&self, call: &mut RuleCall) -> OptResult<()> {
        let converter = match self.converter.as_converter() {
            Some(converter) => converter,
            None => return Ok(()),
        };
        let parent = call.rel(0).clone();
        if parent.is_converter()
            || !parent
                .traits()
                .contains_convention(converter.out_convention())
        {
            return Ok(());
        }

        let input = parent.inputs()[0].clone();
        if let Some(converted) = converter.convert(call.optimizer(), &input)? {
            call.transform_to(parent.copy_with_inputs(vec![converted]));
        }
        Ok(())
    }
}

lazy_static! {
    static ref EXPAND_CONVERSION_OPERAND: RuleOperand =
        RuleOperand::new(OperatorKind::AbstractConverter);
}

/// Expands an abstract converter into a chain of concrete converters.
///
/// The abstract converter stays in place if no chain exists.
#[derive(Clone, Debug, Default)]
pub struct ExpandConversionRule {}

impl ExpandConversionRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for ExpandConversionRule {
    fn description(&self) -> &str {
        "ExpandConversionRule"
    }

    fn operand(&self) -> &RuleOperand {
        &EXPAND_CONVERSION_OPERAND
    }

    fn on_match(&self, call: &mut RuleCall) -> OptResult<()> {
        let abstract_converter = call.rel(0).clone();
        let input = match abstract_converter.inputs().first() {
            Some(input) => input.clone(),
            None => return Ok(()),
        };
        if let Some(converted) = call
            .optimizer()
            .change_traits_using_converters(&input, abstract_converter.traits())?
        {
            call.transform_to(converted);
        }
        Ok(())
    }
}
