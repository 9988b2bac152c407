//! Monte-Carlo tree search for skyline routes.
//!
//! The tree lives in an arena indexed by [`TreeIndex`]. Each tree node points
//! at a graph node and owns the list of its children; parents are plain
//! indices, so selection walks down through `children` and backpropagation
//! walks up through `parent`.
//!
//! One exploration step selects a node by UCT, expands one unexpanded
//! successor, random-walks from it to the destination and offers the walk to
//! the route list. An accepted route credits the expanded node; when the
//! route is later evicted, the credit is taken back. A node's reward is its
//! own credit plus the rewards of its children.
//!
//! The engine is single-threaded. Independent searches may run in parallel.

use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;
use tracing::{debug, info, trace};

use super::config::{Heuristic, SearchConfig};
use super::error::SearchError;
use super::sampling::{draw_admissible, flow_weights, seeded_rng};
use super::snapshot::{SnapshotNode, TreeSnapshot};
use crate::graph::{BuildOutcome, GraphError, NodeId, StationGraph};
use crate::skyline::{CriteriaSet, Criterion, RouteList};
use crate::stations::StationContext;

/// Handle of a node in the search tree arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TreeIndex(usize);

impl TreeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Route-list tag naming the tree node credited with a route and the
/// subtree root its reward propagates up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    pub node: TreeIndex,
    pub subtree_root: TreeIndex,
}

/// A node of the search tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    graph_node: NodeId,
    parent: Option<TreeIndex>,
    children: Vec<TreeIndex>,
    unexpanded: Vec<NodeId>,
    visits: u64,
    reward: f64,
    skyline_contribution: u32,
}

impl TreeNode {
    fn new(graph: &StationGraph, graph_node: NodeId, parent: Option<TreeIndex>) -> Self {
        Self {
            graph_node,
            parent,
            children: Vec::new(),
            unexpanded: graph.node(graph_node).successors().to_vec(),
            visits: 0,
            reward: 0.0,
            skyline_contribution: 0,
        }
    }

    pub fn graph_node(&self) -> NodeId {
        self.graph_node
    }

    pub fn parent(&self) -> Option<TreeIndex> {
        self.parent
    }

    pub fn children(&self) -> &[TreeIndex] {
        &self.children
    }

    pub fn unexpanded(&self) -> &[NodeId] {
        &self.unexpanded
    }

    pub fn visits(&self) -> u64 {
        self.visits
    }

    /// `W`: own skyline contribution plus the children's rewards.
    pub fn reward(&self) -> f64 {
        self.reward
    }

    /// Frontier routes currently credited to this node.
    pub fn skyline_contribution(&self) -> u32 {
        self.skyline_contribution
    }

    /// Nothing left to expand and nothing to descend into.
    pub fn is_exhausted(&self) -> bool {
        self.children.is_empty() && self.unexpanded.is_empty()
    }
}

/// Search tree over one station graph.
pub struct MonteCarloTree<'g> {
    graph: &'g StationGraph,
    context: &'g StationContext,
    criteria: Arc<CriteriaSet>,
    heuristic: Heuristic,
    bias_exponent: f64,
    exploration_constant: f64,
    rng: ChaCha8Rng,
    nodes: Vec<TreeNode>,
}

impl<'g> MonteCarloTree<'g> {
    /// A tree holding only the origin.
    ///
    /// With [`Heuristic::Estimation`] the criteria's estimators must already
    /// be initialised over `graph`.
    pub fn new(
        graph: &'g StationGraph,
        context: &'g StationContext,
        criteria: Arc<CriteriaSet>,
        config: &SearchConfig,
    ) -> Self {
        Self {
            graph,
            context,
            criteria,
            heuristic: config.heuristic,
            bias_exponent: config.bias_exponent,
            exploration_constant: config.exploration_constant,
            rng: seeded_rng(config.seed),
            nodes: vec![TreeNode::new(graph, graph.origin(), None)],
        }
    }

    pub fn root(&self) -> TreeIndex {
        TreeIndex(0)
    }

    pub fn node(&self, index: TreeIndex) -> &TreeNode {
        &self.nodes[index.0]
    }

    /// Arena size, detached nodes included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Graph nodes from the origin down to `index`.
    pub fn path_to(&self, index: TreeIndex) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            path.push(self.nodes[i.0].graph_node);
            current = self.nodes[i.0].parent;
        }
        path.reverse();
        path
    }

    /// Every arena handle, detached nodes included.
    pub fn indices(&self) -> impl Iterator<Item = TreeIndex> + use<> {
        (0..self.nodes.len()).map(TreeIndex)
    }

    /// Nodes reachable from the root through child lists, with their depth.
    pub fn attached(&self) -> Vec<(TreeIndex, usize)> {
        let mut found = Vec::new();
        let mut stack = vec![(self.root(), 0)];
        while let Some((index, depth)) = stack.pop() {
            found.push((index, depth));
            stack.extend(self.nodes[index.0].children.iter().rev().map(|&c| (c, depth + 1)));
        }
        found
    }

    /// `W/N + c·sqrt(ln(parent N) / N)`; `None` for the root.
    pub fn uct(&self, index: TreeIndex) -> Option<f64> {
        let parent = self.nodes[index.0].parent?;
        Some(self.uct_against(index, self.nodes[parent.0].visits))
    }

    fn uct_against(&self, index: TreeIndex, parent_visits: u64) -> f64 {
        let node = &self.nodes[index.0];
        if node.visits == 0 {
            return f64::INFINITY;
        }
        let visits = node.visits as f64;
        node.reward / visits + self.exploration_constant * ((parent_visits as f64).ln() / visits).sqrt()
    }

    /// The child with the best UCT, counting the parent's visit in progress.
    fn best_child(&self, parent: TreeIndex) -> TreeIndex {
        let node = &self.nodes[parent.0];
        let parent_visits = node.visits + 1;
        let mut best = node.children[0];
        let mut best_score = self.uct_against(best, parent_visits);
        for &child in &node.children[1..] {
            let score = self.uct_against(child, parent_visits);
            if score > best_score {
                best = child;
                best_score = score;
            }
        }
        best
    }

    /// Weights for drawing one of `candidates` after `path`, per heuristic.
    pub fn choice_weights(&self, path: &[NodeId], candidates: &[NodeId]) -> Vec<f64> {
        match self.heuristic {
            Heuristic::Uniform => vec![1.0; candidates.len()],
            Heuristic::Flow => flow_weights(
                self.context,
                &self.graph.ids_of(path),
                &self.graph.ids_of(candidates),
            ),
            Heuristic::Estimation => self.estimation_weights(path, candidates),
        }
    }

    /// Mean of every criterion's normalised predicted gain, raised to the
    /// bias exponent.
    fn estimation_weights(&self, path: &[NodeId], candidates: &[NodeId]) -> Vec<f64> {
        let criteria: Vec<&dyn Criterion> = self.criteria.iter().collect();
        if criteria.is_empty() {
            return vec![1.0; candidates.len()];
        }
        let predicted: Vec<Vec<f64>> = candidates
            .iter()
            .map(|&candidate| criteria.iter().map(|c| c.predict_gain(path, candidate)).collect())
            .collect();

        let mut min = vec![f64::INFINITY; criteria.len()];
        let mut max = vec![f64::NEG_INFINITY; criteria.len()];
        for row in &predicted {
            for (k, &value) in row.iter().enumerate() {
                min[k] = min[k].min(value);
                max[k] = max[k].max(value);
            }
        }

        predicted
            .iter()
            .map(|row| {
                let total: f64 = row
                    .iter()
                    .enumerate()
                    .map(|(k, &value)| criteria[k].normalize(value, min[k], max[k]))
                    .sum();
                (total / criteria.len() as f64).powf(self.bias_exponent)
            })
            .collect()
    }

    /// Descend from `subtree_root` to the node to expand.
    ///
    /// Fully expanded nodes hand over to their only child or to the child
    /// with the best UCT. Exhausted nodes met on the way are pruned and the
    /// descent restarts. Visits and hits are counted once, along the path
    /// that finally succeeds. `None` once the subtree root itself is
    /// exhausted.
    pub fn select(&mut self, subtree_root: TreeIndex) -> Option<TreeIndex> {
        let mut path = Vec::new();
        'descent: loop {
            path.clear();
            let mut current = subtree_root;
            loop {
                let node = &self.nodes[current.0];
                if node.is_exhausted() {
                    self.prune(current, subtree_root);
                    if current == subtree_root {
                        return None;
                    }
                    continue 'descent;
                }
                path.push(current);
                if !node.unexpanded.is_empty() {
                    break 'descent;
                }
                current = match node.children.as_slice() {
                    [only] => *only,
                    _ => self.best_child(current),
                };
            }
        }

        for &index in &path {
            self.nodes[index.0].visits += 1;
            self.graph.node(self.nodes[index.0].graph_node).record_hit();
        }
        path.last().copied()
    }

    /// Detach `from` and every ancestor it leaves exhausted, stopping at
    /// `subtree_root`. Rewards above the pruned nodes are recomputed.
    pub fn prune(&mut self, from: TreeIndex, subtree_root: TreeIndex) {
        let mut current = from;
        let mut pruned = false;
        while self.nodes[current.0].is_exhausted() {
            let Some(parent) = self.nodes[current.0].parent else {
                break;
            };
            self.nodes[parent.0].children.retain(|&c| c != current);
            pruned = true;
            trace!(station = %self.graph.node(self.nodes[current.0].graph_node).id(), "exhausted node pruned");
            if current == subtree_root {
                return;
            }
            current = parent;
        }
        if pruned {
            self.backpropagate(current, subtree_root);
        }
    }

    /// Draw one unexpanded successor of `selected` and add it as a child.
    ///
    /// Candidates that would zigzag are discarded. Drawing the destination
    /// offers the completed route straight to `routes` and keeps drawing.
    /// `None` when nothing is left to expand.
    pub fn expand(
        &mut self,
        selected: TreeIndex,
        subtree_root: TreeIndex,
        routes: &RouteList<Contribution>,
    ) -> Option<TreeIndex> {
        let graph = self.graph;
        let context = self.context;
        let destination = graph.destination();
        let path = self.path_to(selected);
        let route = graph.ids_of(&path);

        let mut candidates = std::mem::take(&mut self.nodes[selected.0].unexpanded);
        let mut weights = self.choice_weights(&path, &candidates);
        let drawn = loop {
            match draw_admissible(&mut self.rng, context, graph, &route, &mut candidates, &mut weights) {
                Some(next) if next == destination => {
                    let mut complete = path.clone();
                    complete.push(next);
                    self.submit(&complete, selected, subtree_root, routes);
                }
                other => break other,
            }
        };
        self.nodes[selected.0].unexpanded = candidates;

        match drawn {
            Some(next) => {
                let child = TreeIndex(self.nodes.len());
                self.nodes.push(TreeNode::new(graph, next, Some(selected)));
                self.nodes[selected.0].children.push(child);
                Some(child)
            }
            None => {
                self.prune(selected, subtree_root);
                None
            }
        }
    }

    /// Random-walk from `leaf` to the destination and offer the route.
    /// `false` when the walk runs out of admissible successors.
    pub fn simulate(
        &mut self,
        leaf: TreeIndex,
        subtree_root: TreeIndex,
        routes: &RouteList<Contribution>,
    ) -> bool {
        let graph = self.graph;
        let context = self.context;
        let destination = graph.destination();

        self.nodes[leaf.0].visits += 1;
        let mut path = self.path_to(leaf);
        let mut route = graph.ids_of(&path);
        let mut current = self.nodes[leaf.0].graph_node;
        while current != destination {
            graph.node(current).record_hit();
            let mut candidates = graph.node(current).successors().to_vec();
            let mut weights = self.choice_weights(&path, &candidates);
            let Some(next) = draw_admissible(&mut self.rng, context, graph, &route, &mut candidates, &mut weights)
            else {
                trace!(route = ?route, "random walk hit a dead end");
                return false;
            };
            path.push(next);
            route.push(graph.node(next).id());
            current = next;
        }
        self.submit(&path, leaf, subtree_root, routes);
        true
    }

    /// Offer a complete path, crediting `credited` if it is accepted.
    fn submit(
        &mut self,
        path: &[NodeId],
        credited: TreeIndex,
        subtree_root: TreeIndex,
        routes: &RouteList<Contribution>,
    ) -> bool {
        let tag = Contribution {
            node: credited,
            subtree_root,
        };
        let outcome = routes.add(self.graph.stations_of(path), Some(tag));
        self.apply_evictions(&outcome.evicted);
        if outcome.accepted {
            self.nodes[credited.0].skyline_contribution += 1;
            self.backpropagate(credited, subtree_root);
            trace!(route = ?self.graph.ids_of(path), criteria = ?outcome.criteria, "skyline route found");
        }
        outcome.accepted
    }

    /// Take back the credit for routes that left the frontier.
    pub fn apply_evictions(&mut self, evicted: &[Contribution]) {
        for contribution in evicted {
            let node = &mut self.nodes[contribution.node.0];
            node.skyline_contribution = node.skyline_contribution.saturating_sub(1);
            self.backpropagate(contribution.node, contribution.subtree_root);
        }
    }

    /// Recompute `W = contribution + Σ children W` from `from` up to and
    /// including `subtree_root`.
    pub fn backpropagate(&mut self, from: TreeIndex, subtree_root: TreeIndex) {
        let mut current = Some(from);
        while let Some(index) = current {
            let node = &self.nodes[index.0];
            let reward = f64::from(node.skyline_contribution)
                + node.children.iter().map(|c| self.nodes[c.0].reward).sum::<f64>();
            self.nodes[index.0].reward = reward;
            if index == subtree_root {
                break;
            }
            current = self.nodes[index.0].parent;
        }
    }

    /// One select, expand, simulate step below `subtree_root`. `false` once
    /// the subtree is exhausted.
    pub fn explore_once(&mut self, subtree_root: TreeIndex, routes: &RouteList<Contribution>) -> bool {
        let Some(selected) = self.select(subtree_root) else {
            return false;
        };
        if let Some(leaf) = self.expand(selected, subtree_root, routes) {
            self.simulate(leaf, subtree_root, routes);
        }
        true
    }

    /// Children of the pool members with a positive reward, best first,
    /// at most `limit` of them.
    pub fn promising_children(&self, pool: &[TreeIndex], limit: usize) -> Vec<TreeIndex> {
        let mut next: Vec<TreeIndex> = pool
            .iter()
            .flat_map(|p| self.nodes[p.0].children.iter().copied())
            .filter(|c| self.nodes[c.0].reward > 0.0)
            .collect();
        next.sort_by(|a, b| self.nodes[b.0].reward.total_cmp(&self.nodes[a.0].reward));
        next.truncate(limit);
        next
    }

    pub fn snapshot(&self, round: usize, step: usize, frontier_size: usize) -> TreeSnapshot {
        let nodes = self
            .attached()
            .into_iter()
            .map(|(index, depth)| {
                let node = &self.nodes[index.0];
                SnapshotNode {
                    station: self.graph.node(node.graph_node).id(),
                    parent: node
                        .parent
                        .map(|p| self.graph.node(self.nodes[p.0].graph_node).id()),
                    depth,
                    visits: node.visits,
                    reward: node.reward,
                    skyline_contribution: node.skyline_contribution,
                    uct: self.uct(index),
                }
            })
            .collect();
        TreeSnapshot {
            round,
            step,
            frontier_size,
            nodes,
        }
    }

    /// Panic if an attached node other than the root is exhausted. Such a
    /// node means the tree and the pruning bookkeeping disagree.
    pub fn check_integrity(&self) {
        for (index, _) in self.attached() {
            if index != self.root() && self.nodes[index.0].is_exhausted() {
                panic!(
                    "exhausted tree node {} is still attached",
                    self.graph.node(self.nodes[index.0].graph_node).id()
                );
            }
        }
    }
}

/// Pool size and iteration budget, each decaying towards its floor.
#[derive(Debug, Clone)]
struct Schedule {
    pool_size: f64,
    iterations: f64,
    pool_decay: f64,
    iteration_decay: f64,
    min_pool_size: usize,
    min_iterations: usize,
}

impl Schedule {
    fn new(config: &SearchConfig) -> Self {
        Self {
            pool_size: config.initial_pool_size as f64 + 1e-7,
            iterations: config.initial_iterations as f64 + 1e-7,
            pool_decay: config.pool_decay,
            iteration_decay: config.iteration_decay,
            min_pool_size: config.min_pool_size,
            min_iterations: config.min_iterations,
        }
    }

    fn pool_limit(&self) -> usize {
        self.pool_size as usize
    }

    fn iterations(&self) -> usize {
        self.iterations as usize
    }

    /// A decay step that would drop below its floor is skipped.
    fn decay(&mut self) {
        if ((self.pool_size * self.pool_decay) as usize) >= self.min_pool_size {
            self.pool_size *= self.pool_decay;
        }
        if ((self.iterations * self.iteration_decay) as usize) >= self.min_iterations {
            self.iterations *= self.iteration_decay;
        }
    }
}

/// Counters for one round of the pool schedule.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RoundStats {
    pub round: usize,
    pub pool_size: usize,
    pub iterations: usize,
    pub explorations: usize,
    pub frontier_size: usize,
}

/// Result of a skyline search.
#[derive(Debug)]
pub struct SearchOutcome {
    pub routes: RouteList<Contribution>,
    pub rounds: Vec<RoundStats>,
    /// Tree nodes created, pruned ones included.
    pub tree_size: usize,
}

/// MCTS skyline search with a decaying pool of subtree roots.
pub struct SkylineSearch {
    context: Arc<StationContext>,
    config: SearchConfig,
    snapshots: Option<Arc<watch::Sender<Option<TreeSnapshot>>>>,
}

impl SkylineSearch {
    pub fn new(context: Arc<StationContext>, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            context,
            config,
            snapshots: None,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Publish snapshots into a channel shared with other searches.
    pub fn with_snapshots(mut self, sender: Arc<watch::Sender<Option<TreeSnapshot>>>) -> Self {
        self.snapshots = Some(sender);
        self
    }

    /// Receive tree snapshots while searches run. Publishing never waits
    /// for the receiver.
    pub fn subscribe(&mut self) -> watch::Receiver<Option<TreeSnapshot>> {
        match &self.snapshots {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(None);
                self.snapshots = Some(Arc::new(sender));
                receiver
            }
        }
    }

    /// Search the graph of a build outcome, refusing failed builds.
    pub fn search_outcome(&self, outcome: &BuildOutcome) -> Result<SearchOutcome, SearchError> {
        if !outcome.succeeded() {
            return Err(GraphError::NotSearchable(outcome.status()).into());
        }
        Ok(self.search(outcome.graph()))
    }

    /// Run the full round schedule over `graph`.
    pub fn search(&self, graph: &StationGraph) -> SearchOutcome {
        let config = &self.config;
        let mut criteria = CriteriaSet::standard(Arc::clone(&self.context));
        if config.heuristic == Heuristic::Estimation {
            criteria.init_estimators(graph);
        }
        let routes = RouteList::new(Arc::new(criteria));
        let mut tree = MonteCarloTree::new(graph, &self.context, Arc::clone(routes.criteria()), config);

        info!(
            origin = %graph.node(graph.origin()).id(),
            destination = %graph.node(graph.destination()).id(),
            nodes = graph.len(),
            heuristic = %config.heuristic,
            rounds = config.rounds,
            "starting skyline search"
        );

        let mut schedule = Schedule::new(config);
        let mut pool = vec![tree.root()];
        let mut rounds = Vec::with_capacity(config.rounds);
        for round in 0..config.rounds {
            let budget = schedule.iterations();
            let interval = config.sample_interval * (round + 1);
            let mut explorations = 0;
            for &member in &pool {
                for step in 0..budget {
                    if !tree.explore_once(member, &routes) {
                        trace!(round, step, "subtree exhausted");
                        break;
                    }
                    explorations += 1;
                    if step % interval == 0 {
                        self.publish(&tree, round, step, &routes);
                    }
                }
            }

            let stats = RoundStats {
                round,
                pool_size: pool.len(),
                iterations: budget,
                explorations,
                frontier_size: routes.len(),
            };
            debug!(
                round,
                pool = stats.pool_size,
                iterations = stats.iterations,
                explorations,
                frontier = stats.frontier_size,
                "round finished"
            );
            rounds.push(stats);

            if round + 1 == config.rounds {
                break;
            }
            pool = tree.promising_children(&pool, schedule.pool_limit());
            schedule.decay();
            if pool.is_empty() {
                debug!(round, "no rewarded subtree left to narrow onto");
                break;
            }
        }

        info!(
            routes = routes.len(),
            insertions = routes.insert_count(),
            evictions = routes.eviction_count(),
            tree_nodes = tree.len(),
            "skyline search finished"
        );
        let tree_size = tree.len();
        SearchOutcome {
            routes,
            rounds,
            tree_size,
        }
    }

    fn publish(&self, tree: &MonteCarloTree<'_>, round: usize, step: usize, routes: &RouteList<Contribution>) {
        let Some(sender) = &self.snapshots else {
            return;
        };
        if sender.receiver_count() == 0 {
            return;
        }
        sender.send_replace(Some(tree.snapshot(round, step, routes.len())));
    }
}
