use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Context;
use enumset::EnumSet;
use itertools::Itertools;
use log::{debug, info, trace, warn};

use crate::cost::{Cost, CostModel, VolcanoCostModel};
use crate::error::{OptResult, OptimizerError};
use crate::heuristic::binding::Binding;
use crate::heuristic::{HepInstruction, HepProgram, MatchOrder, PlanGraph};
use crate::listener::{OptimizerListener, RuleProductionEvent};
use crate::operator::{DigestMode, Operator, OperatorTrait, Sort, VertexId};
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::plan::{DigestKey, Plan, PlanNode, PlanNodeRef};
use crate::properties::{Collation, ConversionGraph, Convention, Trait, TraitDef, TraitSet};
use crate::rules::{
    ConverterRule, Rule, RuleCall, RuleKind, RuleRef, TraitMatchingRule,
};

/// Execution state of a running program.
#[derive(Clone, Debug)]
struct ProgramState {
    match_order: MatchOrder,
    match_limit: usize,
    /// Rules collected since group begin.
    group: Option<Vec<RuleRef>>,
}

impl Default for ProgramState {
    fn default() -> Self {
        Self {
            match_order: MatchOrder::Arbitrary,
            match_limit: usize::MAX,
            group: None,
        }
    }
}

/// Program driven rewrite optimizer.
///
/// See [module level docs](crate::heuristic) for an overview.
pub struct HepOptimizer {
    program: HepProgram,
    graph: PlanGraph,
    rules: Vec<RuleRef>,
    rule_map: HashMap<String, RuleRef>,
    conversion_graph: ConversionGraph,
    /// Guaranteed converter rules by `(in, out)` convention.
    converter_arcs: HashMap<(Convention, Convention), Vec<RuleRef>>,
    /// Trait matching companion of each non guaranteed converter rule, by its description.
    trait_matching_rules: HashMap<String, RuleRef>,
    dag: bool,
    digest_mode: DigestMode,
    cost_model: Box<dyn CostModel>,
    listener: Option<Box<dyn OptimizerListener>>,
    root_traits: Option<TraitSet>,
    trait_defs: EnumSet<TraitDef>,
    context: OptimizerContext,
    n_transformations: usize,
    n_transformations_last_gc: usize,
    graph_size_last_gc: usize,
    state: ProgramState,
    row_counts: RefCell<HashMap<VertexId, f64>>,
    cumulative_costs: RefCell<HashMap<VertexId, Cost>>,
}

pub struct HepOptimizerBuilder {
    program: HepProgram,
    rules: Vec<RuleRef>,
    dag: bool,
    digest_mode: DigestMode,
    cost_model: Box<dyn CostModel>,
    listener: Option<Box<dyn OptimizerListener>>,
    root_traits: Option<TraitSet>,
    trait_defs: EnumSet<TraitDef>,
    context: OptimizerContext,
}

impl HepOptimizerBuilder {
    pub fn new(program: HepProgram) -> Self {
        Self {
            program,
            rules: vec![],
            dag: true,
            digest_mode: DigestMode::default(),
            cost_model: Box::new(VolcanoCostModel::default()),
            listener: None,
            root_traits: None,
            trait_defs: TraitDef::all(),
            context: OptimizerContext::default(),
        }
    }

    /// Registers a rule, so that it can be found by description, class and converter
    /// instructions. Rules given by instance in the program are registered automatically.
    pub fn add_rule(mut self, rule: RuleRef) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn add_rules<I: IntoIterator<Item = RuleRef>>(mut self, rules: I) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Whether structurally identical expressions share one vertex, defaults to `true`.
    pub fn with_dag(mut self, dag: bool) -> Self {
        self.dag = dag;
        self
    }

    pub fn with_digest_mode(mut self, digest_mode: DigestMode) -> Self {
        self.digest_mode = digest_mode;
        self
    }

    pub fn with_cost_model(mut self, cost_model: Box<dyn CostModel>) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn with_listener(mut self, listener: Box<dyn OptimizerListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Traits requested for the result, converter rules may fire on the root to provide them.
    pub fn with_root_traits(mut self, traits: TraitSet) -> Self {
        self.root_traits = Some(traits);
        self
    }

    pub fn with_trait_defs(mut self, trait_defs: EnumSet<TraitDef>) -> Self {
        self.trait_defs = trait_defs;
        self
    }

    pub fn with_context(mut self, context: OptimizerContext) -> Self {
        self.context = context;
        self
    }

    pub fn build(self, plan: Plan) -> OptResult<HepOptimizer> {
        let program_rules = self.program.rules();
        let mut optimizer = HepOptimizer {
            program: self.program,
            graph: PlanGraph::default(),
            rules: vec![],
            rule_map: HashMap::new(),
            conversion_graph: ConversionGraph::default(),
            converter_arcs: HashMap::new(),
            trait_matching_rules: HashMap::new(),
            dag: self.dag,
            digest_mode: self.digest_mode,
            cost_model: self.cost_model,
            listener: self.listener,
            root_traits: self.root_traits,
            trait_defs: self.trait_defs,
            context: self.context,
            n_transformations: 0,
            n_transformations_last_gc: 0,
            graph_size_last_gc: 0,
            state: ProgramState::default(),
            row_counts: RefCell::new(HashMap::new()),
            cumulative_costs: RefCell::new(HashMap::new()),
        };

        for rule in self.rules.into_iter().chain(program_rules) {
            optimizer.add_rule(rule)?;
        }
        optimizer.set_root(plan.root())?;
        Ok(optimizer)
    }
}

impl Optimizer for HepOptimizer {
    fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn cost_model(&self) -> &dyn CostModel {
        self.cost_model.as_ref()
    }

    fn resolve(&self, node: &PlanNodeRef) -> PlanNodeRef {
        node.vertex_id()
            .and_then(|id| self.graph.current(id))
            .cloned()
            .unwrap_or_else(|| node.clone())
    }

    /// Row counts of vertices are cached until some input of them changes.
    fn row_count(&self, node: &PlanNodeRef) -> f64 {
        let id = match node.vertex_id() {
            Some(id) if self.graph.contains(id) => id,
            _ => {
                let input_rows = node
                    .inputs()
                    .iter()
                    .map(|input| self.row_count(input))
                    .collect::<Vec<f64>>();
                return node.operator().estimate_row_count(&input_rows);
            }
        };

        if let Some(rows) = self.row_counts.borrow().get(&id) {
            return *rows;
        }
        let rows = self.row_count(&self.resolve(node));
        self.row_counts.borrow_mut().insert(id, rows);
        rows
    }

    /// Cached per vertex like row counts, so shared inputs are costed once.
    fn cumulative_cost(&self, node: &PlanNodeRef) -> Cost {
        let id = match node.vertex_id() {
            Some(id) if self.graph.contains(id) => id,
            _ => {
                let input_rows = node
                    .inputs()
                    .iter()
                    .map(|input| self.row_count(input))
                    .collect::<Vec<f64>>();
                let rows = node.operator().estimate_row_count(&input_rows);
                let self_cost = self.cost_model.self_cost(node, rows, &input_rows);
                return node.inputs().iter().fold(self_cost, |cost, input| {
                    cost.plus(&self.cumulative_cost(input))
                });
            }
        };

        if let Some(cost) = self.cumulative_costs.borrow().get(&id) {
            return *cost;
        }
        let cost = self.cumulative_cost(&self.resolve(node));
        self.cumulative_costs.borrow_mut().insert(id, cost);
        cost
    }

    fn change_traits_using_converters(
        &self,
        node: &PlanNodeRef,
        traits: &TraitSet,
    ) -> OptResult<Option<PlanNodeRef>> {
        let mut converted = node.clone();
        for def in self.trait_defs.iter() {
            let from = converted.traits().get(def);
            let to = traits.get(def);
            if from.satisfies(&to) {
                continue;
            }

            let step = match to {
                Trait::Convention(to) => {
                    self.convert_convention(&converted, converted.convention(), to)?
                }
                Trait::Collation(collation) => Some(self.sort_by(&converted, collation)?),
            };
            match step {
                Some(step) => converted = step,
                None => return Ok(None),
            }
        }
        Ok(Some(converted))
    }

    fn find_best_plan(mut self) -> OptResult<Plan> {
        info!(
            "Starting heuristic optimization with {} instructions",
            self.program.instructions().len()
        );
        let program = self.program.clone();
        self.execute_program(&program)?;

        // Get rid of everything except what's in the final plan.
        self.collect_garbage();

        let root = self.require_root()?;
        let mut built = HashMap::new();
        let root = self.build_final_plan(root, &mut built)?;
        info!(
            "Heuristic optimization finished after {} transformations",
            self.n_transformations
        );
        Ok(Plan::new(root))
    }
}

impl HepOptimizer {
    pub fn graph(&self) -> &PlanGraph {
        &self.graph
    }

    pub fn root_vertex(&self) -> Option<VertexId> {
        self.graph.root()
    }

    /// Number of vertices created and replaced so far.
    pub fn n_transformations(&self) -> usize {
        self.n_transformations
    }

    pub fn rules(&self) -> &[RuleRef] {
        &self.rules
    }

    fn require_root(&self) -> OptResult<VertexId> {
        self.graph
            .root()
            .filter(|root| self.graph.contains(*root))
            .ok_or_else(|| {
                OptimizerError::structural(None, "Root vertex is missing", self.graph.dump())
                    .into()
            })
    }

    /// Registers `rule`, returning `false` if a rule with same description exists.
    pub fn add_rule(&mut self, rule: RuleRef) -> OptResult<bool> {
        if self.rule_map.contains_key(rule.description()) {
            return Ok(false);
        }
        rule.operand()
            .validate()
            .map_err(|message| OptimizerError::InvalidOperand {
                rule: rule.description().to_string(),
                message,
            })?;

        if let Some(converter) = rule.as_converter() {
            if converter.is_guaranteed() {
                let arc = (converter.in_convention(), converter.out_convention());
                self.conversion_graph.add_arc(arc.0, arc.1);
                self.converter_arcs
                    .entry(arc)
                    .or_default()
                    .push(rule.clone());
            } else {
                let companion: RuleRef = Arc::new(TraitMatchingRule::new(rule.clone())?);
                self.trait_matching_rules
                    .insert(rule.description().to_string(), companion);
            }
        }

        debug!("Registered rule {}", rule.description());
        self.rule_map
            .insert(rule.description().to_string(), rule.clone());
        self.rules.push(rule);
        Ok(true)
    }

    /// Adds `plan` to the graph and makes it the root.
    pub fn set_root(&mut self, plan: PlanNodeRef) -> OptResult<()> {
        let root = self.add_to_graph(&plan)?;
        self.graph.set_root(root);
        trace!("Plan graph after setting root:\n{}", self.graph.dump());
        Ok(())
    }

    /// Adds `node` and its inputs to the graph, returning the vertex of `node`.
    ///
    /// Placeholders map to their own vertices. In dag mode, expressions whose digest key is
    /// already registered map to the existing vertex.
    pub fn add_to_graph(&mut self, node: &PlanNodeRef) -> OptResult<VertexId> {
        if let Some(id) = node.vertex_id() {
            if !self.graph.contains(id) {
                return Err(OptimizerError::structural(
                    None,
                    format!("Reference to removed vertex {}", id.index()),
                    self.graph.dump(),
                )
                .into());
            }
            return Ok(id);
        }

        let mut changed = false;
        let mut inputs = Vec::with_capacity(node.inputs().len());
        for input in node.inputs() {
            let id = self.add_to_graph(input)?;
            let placeholder = self.placeholder(id)?;
            changed |= !Arc::ptr_eq(&placeholder, input);
            inputs.push(placeholder);
        }

        let node = if changed {
            Arc::new(node.copy_with_inputs(inputs))
        } else {
            node.clone()
        };

        let key = DigestKey::new(&node, self.digest_mode);
        if self.dag {
            if let Some(id) = self.graph.lookup(&key) {
                return Ok(id);
            }
        }

        let id = self.graph.add_vertex(node.clone(), key.clone());
        self.graph.register(key, id);
        for input in node.inputs() {
            if let Some(input_id) = input.vertex_id() {
                self.graph.add_edge(id, input_id);
            }
        }
        self.n_transformations += 1;
        Ok(id)
    }

    fn placeholder(&self, id: VertexId) -> OptResult<PlanNodeRef> {
        self.graph.placeholder(id).cloned().ok_or_else(|| {
            OptimizerError::structural(
                None,
                format!("Vertex {} is missing", id.index()),
                self.graph.dump(),
            )
            .into()
        })
    }

    /// Replaces expression of `id` with `node`, keeping the digest map in sync.
    fn update_vertex(&mut self, id: VertexId, node: PlanNodeRef) -> OptResult<()> {
        let key = DigestKey::new(&node, self.digest_mode);
        let (old_node, old_key) = self
            .graph
            .set_current(id, node.clone(), key.clone())
            .ok_or_else(|| {
                OptimizerError::structural(
                    None,
                    format!("Updating missing vertex {}", id.index()),
                    self.graph.dump(),
                )
            })?;
        self.graph.unregister(&old_key, id);
        self.graph.register(key, id);

        if !Arc::ptr_eq(&old_node, &node) {
            if let Some(listener) = self.listener.as_mut() {
                listener.rel_discarded(&old_node);
            }
        }
        Ok(())
    }

    /// Redirects `parents` of `discarded` to `preserved`.
    ///
    /// `discarded` stays in the graph, it may still be reachable from `preserved`. Garbage
    /// collection removes it otherwise.
    pub fn contract_vertices(
        &mut self,
        preserved: VertexId,
        discarded: VertexId,
        parents: &[VertexId],
    ) -> OptResult<()> {
        if preserved == discarded {
            return Ok(());
        }

        let preserved_node = self.current(preserved)?;
        self.update_vertex(preserved, preserved_node)?;
        let placeholder = self.placeholder(preserved)?;

        for &parent in parents {
            let parent_node = self.current(parent)?;
            let inputs = parent_node
                .inputs()
                .iter()
                .map(|input| {
                    if input.vertex_id() == Some(discarded) {
                        placeholder.clone()
                    } else {
                        input.clone()
                    }
                })
                .collect::<Vec<PlanNodeRef>>();

            self.clear_cache(parent);
            self.graph.remove_edge(parent, discarded);
            self.graph.add_edge(parent, preserved);
            self.update_vertex(parent, Arc::new(parent_node.copy_with_inputs(inputs)))?;
        }

        if self.graph.root() == Some(discarded) {
            self.graph.set_root(preserved);
        }
        Ok(())
    }

    fn current(&self, id: VertexId) -> OptResult<PlanNodeRef> {
        self.graph.current(id).cloned().ok_or_else(|| {
            OptimizerError::structural(
                None,
                format!("Vertex {} is missing", id.index()),
                self.graph.dump(),
            )
            .into()
        })
    }

    /// Drops cached row counts and costs of `id` and everything above it.
    fn clear_cache(&mut self, id: VertexId) {
        let row_counts = self.row_counts.get_mut();
        let cumulative_costs = self.cumulative_costs.get_mut();
        let mut visited = HashSet::new();
        let mut queue = vec![id];
        while let Some(id) = queue.pop() {
            if visited.insert(id) {
                row_counts.remove(&id);
                cumulative_costs.remove(&id);
                queue.extend(self.graph.parents(id));
            }
        }
    }

    /// Mark and sweep from root, skipped if nothing changed since last collection.
    pub fn collect_garbage(&mut self) {
        if self.n_transformations == self.n_transformations_last_gc {
            return;
        }
        self.n_transformations_last_gc = self.n_transformations;

        let root = match self.graph.root() {
            Some(root) if self.graph.contains(root) => root,
            _ => {
                debug!("Skipped garbage collection without root vertex");
                return;
            }
        };

        let reachable = self.graph.reachable_from(root);
        self.graph_size_last_gc = reachable.len();
        if reachable.len() == self.graph.vertex_count() {
            return;
        }

        let garbage = self
            .graph
            .vertex_ids()
            .into_iter()
            .filter(|id| !reachable.contains(id))
            .collect::<HashSet<VertexId>>();
        debug!("Collecting {} unreachable vertices", garbage.len());

        if let Some(listener) = self.listener.as_mut() {
            for id in garbage.iter().sorted() {
                if let Some(node) = self.graph.current(*id) {
                    listener.rel_discarded(node);
                }
            }
        }

        let row_counts = self.row_counts.get_mut();
        let cumulative_costs = self.cumulative_costs.get_mut();
        for id in &garbage {
            self.graph.remove_vertex(*id);
            row_counts.remove(id);
            cumulative_costs.remove(id);
        }
        self.graph.purge(&garbage);
    }

    /// Executes `program` with fresh execution state, restoring current state afterwards.
    pub fn execute_program(&mut self, program: &HepProgram) -> OptResult<()> {
        let saved = std::mem::take(&mut self.state);
        for instruction in program.instructions() {
            trace!("Executing instruction {:?}", instruction);
            if let Err(e) = self.execute_instruction(instruction) {
                self.state = saved;
                return Err(e);
            }

            // Amortize collection cost over instructions, keeping memory proportional to graph
            // size.
            let delta = self.n_transformations - self.n_transformations_last_gc;
            if delta > self.graph_size_last_gc {
                self.collect_garbage();
            }
        }
        self.state = saved;
        Ok(())
    }

    fn execute_instruction(&mut self, instruction: &HepInstruction) -> OptResult<()> {
        match instruction {
            HepInstruction::RuleInstance(rule) => self.apply_rules(vec![rule.clone()], true),
            HepInstruction::RuleByDescription(description) => {
                match self.rule_map.get(description).cloned() {
                    Some(rule) => self.apply_rules(vec![rule], true),
                    None => {
                        warn!("No rule registered with description {}", description);
                        Ok(())
                    }
                }
            }
            HepInstruction::RuleClass(predicate) => {
                let rules = self
                    .rules
                    .iter()
                    .filter(|rule| predicate(rule.as_ref()))
                    .cloned()
                    .collect();
                self.apply_rules(rules, true)
            }
            HepInstruction::RuleCollection(rules) => self.apply_rules(rules.clone(), true),
            HepInstruction::ConverterRules { guaranteed } => {
                self.ensure_no_group(instruction)?;
                let mut rules = vec![];
                for rule in &self.rules {
                    match rule.as_converter() {
                        Some(converter) if converter.is_guaranteed() == *guaranteed => {
                            rules.push(rule.clone());
                            if let Some(companion) =
                                self.trait_matching_rules.get(rule.description())
                            {
                                rules.push(companion.clone());
                            }
                        }
                        _ => {}
                    }
                }
                self.apply_rules(rules, *guaranteed)
            }
            HepInstruction::CommonRelSubExprRules => {
                self.ensure_no_group(instruction)?;
                let rules = self
                    .rules
                    .iter()
                    .filter(|rule| rule.kind() == RuleKind::CommonRelSubExpr)
                    .cloned()
                    .collect();
                self.apply_rules(rules, true)
            }
            HepInstruction::MatchOrder(order) => {
                self.state.match_order = *order;
                Ok(())
            }
            HepInstruction::MatchLimit(limit) => {
                self.state.match_limit = *limit;
                Ok(())
            }
            HepInstruction::Subprogram(program) => {
                trace!("Entering subprogram");
                loop {
                    let before = self.n_transformations;
                    self.execute_program(program)?;
                    if self.n_transformations == before {
                        break;
                    }
                }
                trace!("Leaving subprogram");
                Ok(())
            }
            HepInstruction::BeginGroup => {
                self.ensure_no_group(instruction)?;
                self.state.group = Some(vec![]);
                Ok(())
            }
            HepInstruction::EndGroup => {
                let rules = self.state.group.take().ok_or_else(|| {
                    OptimizerError::InvalidProgram("Group end without group begin".to_string())
                })?;
                self.apply_rules(rules, true)
            }
        }
    }

    fn ensure_no_group(&self, instruction: &HepInstruction) -> OptResult<()> {
        if self.state.group.is_some() {
            return Err(OptimizerError::InvalidProgram(format!(
                "{:?} inside a group",
                instruction
            ))
            .into());
        }
        Ok(())
    }

    /// Vertices to visit in current match order, starting from `start` for depth first orders.
    fn graph_iterator(&mut self, start: VertexId) -> OptResult<std::vec::IntoIter<VertexId>> {
        // Topological sort covers the whole graph, so garbage must go first.
        self.collect_garbage();

        let ids = match self.state.match_order {
            MatchOrder::Arbitrary | MatchOrder::DepthFirst => self.graph.depth_first_from(start),
            MatchOrder::TopDown => self.graph.topological_order()?,
            MatchOrder::BottomUp => {
                let mut ids = self.graph.topological_order()?;
                ids.reverse();
                ids
            }
        };
        Ok(ids.into_iter())
    }

    fn apply_rules(&mut self, rules: Vec<RuleRef>, force_conversions: bool) -> OptResult<()> {
        if let Some(group) = self.state.group.as_mut() {
            for rule in rules {
                if !group.iter().any(|r| r.description() == rule.description()) {
                    group.push(rule);
                }
            }
            return Ok(());
        }

        trace!(
            "Applying rule set [{}]",
            rules.iter().map(|r| r.description()).join(", ")
        );
        let full_restart = !matches!(
            self.state.match_order,
            MatchOrder::Arbitrary | MatchOrder::DepthFirst
        );
        let mut n_matches = 0usize;

        loop {
            let root = self.require_root()?;
            let mut iter = self.graph_iterator(root)?;
            let mut fixed_point = true;

            while let Some(vertex) = iter.next() {
                for rule in &rules {
                    let new_vertex = match self.apply_rule(rule, vertex, force_conversions)? {
                        Some(new_vertex) if new_vertex != vertex => new_vertex,
                        _ => continue,
                    };

                    n_matches += 1;
                    if n_matches >= self.state.match_limit {
                        return Ok(());
                    }

                    if full_restart {
                        let root = self.require_root()?;
                        iter = self.graph_iterator(root)?;
                    } else {
                        // Pick up where we left off, transformation invalidated old iterator.
                        iter = self.graph_iterator(new_vertex)?;
                        if self.state.match_order == MatchOrder::DepthFirst {
                            n_matches = self.depth_first_apply(
                                &mut iter,
                                &rules,
                                force_conversions,
                                n_matches,
                            )?;
                            if n_matches >= self.state.match_limit {
                                return Ok(());
                            }
                        }
                        // Go around again since we're skipping some vertices.
                        fixed_point = false;
                    }
                    break;
                }
            }

            if fixed_point {
                return Ok(());
            }
        }
    }

    fn depth_first_apply(
        &mut self,
        iter: &mut std::vec::IntoIter<VertexId>,
        rules: &[RuleRef],
        force_conversions: bool,
        mut n_matches: usize,
    ) -> OptResult<usize> {
        while let Some(vertex) = iter.next() {
            for rule in rules {
                let new_vertex = match self.apply_rule(rule, vertex, force_conversions)? {
                    Some(new_vertex) if new_vertex != vertex => new_vertex,
                    _ => continue,
                };

                n_matches += 1;
                if n_matches >= self.state.match_limit {
                    return Ok(n_matches);
                }

                let mut depth_iter = self.graph_iterator(new_vertex)?;
                n_matches =
                    self.depth_first_apply(&mut depth_iter, rules, force_conversions, n_matches)?;
                if n_matches >= self.state.match_limit {
                    return Ok(n_matches);
                }
                break;
            }
        }
        Ok(n_matches)
    }

    /// Whether some parent of `vertex`, or the requested root traits, wants the output of
    /// `converter`.
    fn does_converter_apply(&self, converter: &ConverterRule, vertex: VertexId) -> bool {
        let out = converter.out_convention();
        let wanted_by_parent = self
            .graph
            .parents(vertex)
            .into_iter()
            .filter_map(|parent| self.graph.current(parent))
            .any(|parent| !parent.is_converter() && parent.traits().contains_convention(out));

        wanted_by_parent
            || (self.graph.root() == Some(vertex)
                && self
                    .root_traits
                    .as_ref()
                    .map_or(false, |traits| traits.contains_convention(out)))
    }

    /// Tries to fire `rule` on `vertex`, returning vertex of the result.
    fn apply_rule(
        &mut self,
        rule: &RuleRef,
        vertex: VertexId,
        force_conversions: bool,
    ) -> OptResult<Option<VertexId>> {
        if !self.graph.contains(vertex) {
            return Ok(None);
        }

        let mut parent_convention = None;
        let mut parents = None;
        match rule.kind() {
            RuleKind::Converter => {
                if let Some(converter) = rule.as_converter() {
                    // Otherwise converter rules tend to fire to infinity.
                    if converter.is_guaranteed() || !force_conversions {
                        if !self.does_converter_apply(converter, vertex) {
                            return Ok(None);
                        }
                        parent_convention = Some(converter.out_convention());
                    }
                }
            }
            RuleKind::CommonRelSubExpr => {
                let parent_vertices = self.graph.parents(vertex);
                if parent_vertices.len() < 2 {
                    return Ok(None);
                }
                parents = Some(
                    parent_vertices
                        .into_iter()
                        .filter_map(|parent| self.graph.current(parent).cloned())
                        .collect::<Vec<PlanNodeRef>>(),
                );
            }
            _ => {}
        }

        let node = self.current(vertex)?;
        let mut binding = Binding::new(&self.graph);
        if !binding.match_operands(rule.operand(), &node)? {
            return Ok(None);
        }
        let (rels, node_inputs) = binding.into_parts();

        let results = {
            let mut call = RuleCall::new(&*self, rule.as_ref(), rels, node_inputs, parents);
            if !rule.matches(&call) {
                return Ok(None);
            }
            trace!(
                "Firing rule {} on {}",
                rule.description(),
                node.digest(DigestMode::Full)
            );
            rule.on_match(&mut call)
                .with_context(|| format!("Failed to fire rule {}", rule.description()))?;
            call.into_results()
        };

        if let Some(listener) = self.listener.as_mut() {
            listener.rule_attempted(rule.description(), &node);
        }
        if results.is_empty() {
            return Ok(None);
        }

        self.apply_transformation_results(rule.as_ref(), vertex, &node, results, parent_convention)
    }

    fn apply_transformation_results(
        &mut self,
        rule: &dyn Rule,
        vertex: VertexId,
        before: &PlanNodeRef,
        results: Vec<PlanNodeRef>,
        parent_convention: Option<Convention>,
    ) -> OptResult<Option<VertexId>> {
        let candidates = results.len();
        let best = self.choose_best(results)?;

        // Parents taken before adding the result, so that only existing parents get updated.
        let parents = self
            .graph
            .parents(vertex)
            .into_iter()
            .filter(|parent| match parent_convention {
                None => true,
                Some(convention) => self.graph.current(*parent).map_or(false, |parent| {
                    !parent.is_converter() && parent.traits().contains_convention(convention)
                }),
            })
            .collect::<Vec<VertexId>>();

        let new_vertex = self.add_to_graph(&best)?;
        // The result may equal a parent due to common sub expression recognition, which would
        // make a loop.
        if parents.contains(&new_vertex) {
            return Ok(None);
        }
        self.contract_vertices(new_vertex, vertex, &parents)?;
        if new_vertex != vertex {
            self.n_transformations += 1;
        }

        debug!(
            "Rule {} rewrote vertex {} into vertex {}",
            rule.description(),
            vertex.index(),
            new_vertex.index()
        );
        if cfg!(debug_assertions) {
            self.graph.check_acyclic(Some(rule.description()))?;
        }

        if self.listener.is_some() {
            let after = self.current(new_vertex)?;
            let event = RuleProductionEvent {
                rule: rule.description().to_string(),
                before: before.digest(DigestMode::Full).to_string(),
                after: after.digest(DigestMode::Full).to_string(),
                before_cost: self.cumulative_cost(before),
                after_cost: self.cumulative_cost(&after),
                candidates,
            };
            if let Some(listener) = self.listener.as_mut() {
                listener.rule_production_succeeded(&event);
            }
            // Listeners don't want to see garbage.
            self.collect_garbage();
        }

        Ok(Some(new_vertex))
    }

    /// Cheapest of `results`, ties going to the earlier one.
    fn choose_best(&self, results: Vec<PlanNodeRef>) -> OptResult<PlanNodeRef> {
        if results.len() == 1 {
            return results
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("Empty rule results"));
        }

        let mut best: Option<(PlanNodeRef, Cost)> = None;
        for result in results {
            let cost = self.cumulative_cost(&result);
            trace!(
                "Considering {} with cumulative cost {}",
                result.digest(DigestMode::Full),
                cost
            );
            let better = match &best {
                Some((_, best_cost)) => self.cost_model.is_lt(&cost, best_cost),
                None => true,
            };
            if better {
                best = Some((result, cost));
            }
        }
        best.map(|(node, _)| node)
            .ok_or_else(|| anyhow::anyhow!("Empty rule results"))
    }

    fn convert_convention(
        &self,
        node: &PlanNodeRef,
        from: Convention,
        to: Convention,
    ) -> OptResult<Option<PlanNodeRef>> {
        // Shortest path first.
        let path = match self.conversion_graph.paths(from, to).into_iter().next() {
            Some(path) => path,
            None => return Ok(None),
        };

        let mut converted = node.clone();
        for (previous, next) in path.into_iter().tuple_windows() {
            converted = match self.change_convention(&converted, previous, next)? {
                Some(converted) => converted,
                None => {
                    return Err(OptimizerError::structural(
                        None,
                        format!(
                            "Converter from {} to {} guaranteed that it could convert any expression",
                            previous, next
                        ),
                        self.graph.dump(),
                    )
                    .into())
                }
            };
        }
        Ok(Some(converted))
    }

    fn change_convention(
        &self,
        node: &PlanNodeRef,
        from: Convention,
        to: Convention,
    ) -> OptResult<Option<PlanNodeRef>> {
        if let Some(rules) = self.converter_arcs.get(&(from, to)) {
            for rule in rules {
                if let Some(converter) = rule.as_converter() {
                    if let Some(converted) = converter.convert(self, node)? {
                        return Ok(Some(converted));
                    }
                }
            }
        }
        Ok(None)
    }

    fn sort_by(&self, node: &PlanNodeRef, collation: Collation) -> OptResult<PlanNodeRef> {
        let traits = node.traits().replace(collation.clone());
        Ok(Arc::new(PlanNode::new(
            Operator::Sort(Sort::new(collation)),
            vec![node.clone()],
            traits,
        )?))
    }

    fn build_final_plan(
        &mut self,
        vertex: VertexId,
        built: &mut HashMap<VertexId, PlanNodeRef>,
    ) -> OptResult<PlanNodeRef> {
        if let Some(node) = built.get(&vertex) {
            return Ok(node.clone());
        }

        let node = self.current(vertex)?;
        if matches!(node.operator(), Operator::AbstractConverter(_)) {
            return Err(OptimizerError::UnimplementedNode {
                digest: node.digest(DigestMode::Full).to_string(),
            }
            .into());
        }
        if let Some(listener) = self.listener.as_mut() {
            listener.rel_chosen(&node);
        }

        let mut inputs = Vec::with_capacity(node.inputs().len());
        for input in node.inputs() {
            match input.vertex_id() {
                Some(id) => inputs.push(self.build_final_plan(id, built)?),
                None => inputs.push(input.clone()),
            }
        }

        let node = Arc::new(node.copy_with_inputs(inputs));
        built.insert(vertex, node.clone());
        Ok(node)
    }
}
