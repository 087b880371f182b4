//! Consistency checks over a finished model.
//!
//! Validation never fails: every finding is collected into a
//! [`ValidationReport`] that travels alongside the export, because several
//! findings are advisory (an absorbing state that is not marked terminal is a
//! dead end on purpose, literature ranges may be reversed on purpose).

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chain_graph::ChainGraph;
use crate::conversion::DEFAULT_LARGE_RATE_THRESHOLD;
use crate::store::ModelSnapshot;
use crate::types::{Chain, EntityKey, StateId};

/// Tunables for [`validate_with`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Annual rates above this under linear conversion are reported
    pub large_rate_threshold: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            large_rate_threshold: DEFAULT_LARGE_RATE_THRESHOLD,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnreachableState,
    DeadEndState,
    OverflowingStaticMass,
    DuplicateEdge,
    CrossChainTransition,
    DanglingReference,
    BoundsInconsistent,
    LargeAnnualRate,
    MissingInitialState,
    MissingTerminalState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// A non-initial state the initial state cannot reach
    UnreachableState { chain: String, state: String },
    /// A non-terminal state with no outgoing transition
    DeadEndState { chain: String, state: String },
    /// Static outgoing probabilities of a state without dynamic edges sum above 1
    OverflowingStaticMass {
        chain: String,
        state: String,
        total: f64,
    },
    DuplicateEdge {
        chain: String,
        from: String,
        to: String,
        count: usize,
    },
    /// A stored transition of `chain` with an endpoint in another chain
    CrossChainTransition {
        chain: String,
        from: String,
        to: String,
    },
    /// `entity` points at `missing`, which is no longer stored
    DanglingReference { entity: EntityKey, missing: EntityKey },
    /// `low <= value <= high` does not hold
    BoundsInconsistent {
        slug: String,
        value: f64,
        low: f64,
        high: f64,
    },
    /// Linear conversion applied to a rate where the compounding form differs noticeably
    LargeAnnualRate {
        chain: String,
        from: String,
        to: String,
        annual_rate: f64,
    },
    MissingInitialState { chain: String },
    MissingTerminalState { chain: String },
}

impl ValidationIssue {
    pub fn kind(&self) -> IssueKind {
        match self {
            Self::UnreachableState { .. } => IssueKind::UnreachableState,
            Self::DeadEndState { .. } => IssueKind::DeadEndState,
            Self::OverflowingStaticMass { .. } => IssueKind::OverflowingStaticMass,
            Self::DuplicateEdge { .. } => IssueKind::DuplicateEdge,
            Self::CrossChainTransition { .. } => IssueKind::CrossChainTransition,
            Self::DanglingReference { .. } => IssueKind::DanglingReference,
            Self::BoundsInconsistent { .. } => IssueKind::BoundsInconsistent,
            Self::LargeAnnualRate { .. } => IssueKind::LargeAnnualRate,
            Self::MissingInitialState { .. } => IssueKind::MissingInitialState,
            Self::MissingTerminalState { .. } => IssueKind::MissingTerminalState,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreachableState { chain, state } => {
                write!(f, "[{}] '{}' is unreachable from the initial state", chain, state)
            }
            Self::DeadEndState { chain, state } => {
                write!(f, "[{}] '{}' has no outgoing transition", chain, state)
            }
            Self::OverflowingStaticMass {
                chain,
                state,
                total,
            } => write!(
                f,
                "[{}] static probabilities leaving '{}' sum to {}",
                chain, state, total
            ),
            Self::DuplicateEdge {
                chain,
                from,
                to,
                count,
            } => write!(f, "[{}] {} transitions for {} -> {}", chain, count, from, to),
            Self::CrossChainTransition { chain, from, to } => {
                write!(f, "[{}] {} -> {} leaves the chain", chain, from, to)
            }
            Self::DanglingReference { entity, missing } => {
                write!(f, "{} references missing {}", entity, missing)
            }
            Self::BoundsInconsistent {
                slug,
                value,
                low,
                high,
            } => write!(
                f,
                "'{}' value {} is outside [{}, {}]",
                slug, value, low, high
            ),
            Self::LargeAnnualRate {
                chain,
                from,
                to,
                annual_rate,
            } => write!(
                f,
                "[{}] {} -> {} linearly converts annual rate {}",
                chain, from, to, annual_rate
            ),
            Self::MissingInitialState { chain } => write!(f, "[{}] no initial state", chain),
            Self::MissingTerminalState { chain } => write!(f, "[{}] no terminal state", chain),
        }
    }
}

/// Every finding of one validation pass
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |issue| issue.kind() == kind)
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.of_kind(kind).next().is_some()
    }

    /// Issue counts per kind, for logging
    pub fn summary(&self) -> BTreeMap<IssueKind, usize> {
        let mut summary = BTreeMap::new();
        for issue in &self.issues {
            *summary.entry(issue.kind()).or_insert(0) += 1;
        }
        summary
    }
}

/// Validate with default settings
pub fn validate(snapshot: &ModelSnapshot) -> ValidationReport {
    validate_with(snapshot, &ValidationConfig::default())
}

pub fn validate_with(snapshot: &ModelSnapshot, config: &ValidationConfig) -> ValidationReport {
    let mut issues = Vec::new();

    check_bounds(snapshot, &mut issues);
    check_dangling(snapshot, &mut issues);
    for chain in &snapshot.chains {
        check_chain(snapshot, chain, config, &mut issues);
    }

    ValidationReport { issues }
}

fn check_bounds(snapshot: &ModelSnapshot, issues: &mut Vec<ValidationIssue>) {
    for input in &snapshot.raw_inputs {
        if !input.bounds().is_consistent() {
            issues.push(ValidationIssue::BoundsInconsistent {
                slug: input.slug.clone(),
                value: input.value,
                low: input.low,
                high: input.high,
            });
        }
    }
}

fn check_dangling(snapshot: &ModelSnapshot, issues: &mut Vec<ValidationIssue>) {
    let chains: HashSet<_> = snapshot.chains.iter().map(|c| c.id).collect();
    let states: HashSet<_> = snapshot.states.iter().map(|s| s.id).collect();
    let references: HashSet<_> = snapshot.references.iter().map(|r| r.id).collect();

    let mut dangling = |entity: EntityKey, missing: EntityKey| {
        issues.push(ValidationIssue::DanglingReference { entity, missing });
    };

    for input in &snapshot.raw_inputs {
        if let Some(reference) = input.reference {
            if !references.contains(&reference) {
                dangling(EntityKey::RawInput(input.id), EntityKey::Reference(reference));
            }
        }
    }

    for chain in &snapshot.chains {
        for marker in [chain.initial_state, chain.terminal_state].into_iter().flatten() {
            if !states.contains(&marker) {
                dangling(EntityKey::Chain(chain.id), EntityKey::State(marker));
            }
        }
    }

    for state in &snapshot.states {
        if !chains.contains(&state.chain) {
            dangling(EntityKey::State(state.id), EntityKey::Chain(state.chain));
        }
    }

    for tp in &snapshot.transitions {
        let entity = EntityKey::Transition(tp.id);
        for state in [tp.from_state, tp.to_state] {
            if !states.contains(&state) {
                dangling(entity, EntityKey::State(state));
            }
        }
        if !chains.contains(&tp.chain) {
            dangling(entity, EntityKey::Chain(tp.chain));
        }
    }

    for interaction in &snapshot.interactions {
        let entity = EntityKey::Interaction(interaction.id);
        for state in [
            interaction.in_state,
            interaction.from_state,
            interaction.to_state,
        ] {
            if !states.contains(&state) {
                dangling(entity, EntityKey::State(state));
            }
        }
        if !chains.contains(&interaction.effected_chain) {
            dangling(entity, EntityKey::Chain(interaction.effected_chain));
        }
    }
}

fn check_chain(
    snapshot: &ModelSnapshot,
    chain: &Chain,
    config: &ValidationConfig,
    issues: &mut Vec<ValidationIssue>,
) {
    let graph = ChainGraph::build(snapshot, chain);
    let name = |id: StateId| snapshot.state_name(id);

    if chain.initial_state.is_none() {
        issues.push(ValidationIssue::MissingInitialState {
            chain: chain.name.clone(),
        });
    }
    if chain.terminal_state.is_none() {
        issues.push(ValidationIssue::MissingTerminalState {
            chain: chain.name.clone(),
        });
    }

    // endpoints that no longer exist are already dangling
    for tp in graph.stray() {
        if snapshot.state(tp.from_state).is_some() && snapshot.state(tp.to_state).is_some() {
            issues.push(ValidationIssue::CrossChainTransition {
                chain: chain.name.clone(),
                from: name(tp.from_state),
                to: name(tp.to_state),
            });
        }
    }

    let transitions = graph.ordered_transitions();
    let mut edge_counts: BTreeMap<(StateId, StateId), usize> = BTreeMap::new();
    for tp in &transitions {
        *edge_counts.entry((tp.from_state, tp.to_state)).or_insert(0) += 1;
    }
    for ((from, to), count) in &edge_counts {
        if *count > 1 {
            issues.push(ValidationIssue::DuplicateEdge {
                chain: chain.name.clone(),
                from: name(*from),
                to: name(*to),
                count: *count,
            });
        }
    }

    let initial = chain.initial_state.filter(|id| graph.contains(*id));
    // Without a marked entry, fall back to "no incoming edge" with the first state as entry
    let reachable: HashSet<StateId> = match initial {
        Some(start) => graph.reachable_from(start),
        None => {
            let first = graph.states().next().map(|state| state.id);
            graph
                .states()
                .map(|state| state.id)
                .filter(|id| Some(*id) == first || graph.has_incoming(*id))
                .collect()
        }
    };

    for state in graph.states() {
        if !reachable.contains(&state.id) {
            issues.push(ValidationIssue::UnreachableState {
                chain: chain.name.clone(),
                state: state.name.clone(),
            });
        }

        let leaving = graph.outgoing(state.id);
        if leaving.is_empty() && chain.terminal_state != Some(state.id) {
            issues.push(ValidationIssue::DeadEndState {
                chain: chain.name.clone(),
                state: state.name.clone(),
            });
        }

        // a dynamic share is only known at simulation time
        if leaving.iter().any(|tp| tp.is_dynamic()) {
            continue;
        }
        let total: f64 = leaving.iter().filter_map(|tp| tp.tp_base()).sum();
        if total > 1.0 {
            issues.push(ValidationIssue::OverflowingStaticMass {
                chain: chain.name.clone(),
                state: state.name.clone(),
                total,
            });
        }
    }

    for tp in &transitions {
        let Some(provenance) = tp.provenance() else {
            continue;
        };
        if provenance.conversion.is_linear()
            && provenance.annual_rate > config.large_rate_threshold
        {
            issues.push(ValidationIssue::LargeAnnualRate {
                chain: chain.name.clone(),
                from: name(tp.from_state),
                to: name(tp.to_state),
                annual_rate: provenance.annual_rate,
            });
        }
    }
}
