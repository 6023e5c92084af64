//! Dependency resolution.
//!
//! A backtracking solver with conflict-directed jumpback. All candidate
//! enumeration goes through [`CandidateSource`], so the solver itself is
//! deterministic and sequential: same inputs, same graph.

pub mod encode;
pub mod graph;

pub use encode::{Lockfile, LOCK_VERSION};
pub use graph::DependencyGraph;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Result;

use crate::core::{Dependency, Error, Registration, Workspace};
use crate::sources::SourceManager;

/// Candidate lookup backing the solver.
///
/// Production code hands in a [`SourceManager`]; tests use an in-memory
/// index.
pub trait CandidateSource {
    fn candidates(&self, dep: &Dependency) -> Result<Vec<Registration>>;
}

impl CandidateSource for SourceManager {
    fn candidates(&self, dep: &Dependency) -> Result<Vec<Registration>> {
        self.resolve(dep)
    }
}

/// Resolve the workspace against the given sources.
///
/// `locked` carries lock preservation: if a name appears there and its
/// locked version still satisfies the accumulated constraint, that version
/// is tried first.
pub fn resolve(
    workspace: &Workspace,
    locked: &[Registration],
    sources: &dyn CandidateSource,
) -> Result<DependencyGraph> {
    let solver = Solver {
        sources,
        locked: locked
            .iter()
            .map(|reg| (reg.name().to_string(), reg.clone()))
            .collect(),
        cache: RefCell::new(HashMap::new()),
    };

    // Seed the worklist with every direct dependency, deduplicated by name
    // with constraints intersected.
    let mut constraints = BTreeMap::new();
    let declarations = std::iter::once(("root", &workspace.root.dependencies))
        .chain(
            workspace
                .members
                .iter()
                .map(|m| (m.name.as_str(), &m.dependencies)),
        );
    for (declarer, deps) in declarations {
        for dep in deps {
            merge_constraint(&mut constraints, dep, declarer)
                .map_err(|conflict| Error::ResolveFailed {
                    detail: conflict.detail,
                })?;
        }
    }

    let solution = match solver.solve(constraints, BTreeMap::new()) {
        Ok(solution) => solution,
        Err(SolveError::Conflict(conflict)) => {
            return Err(Error::ResolveFailed {
                detail: conflict.detail,
            }
            .into())
        }
        Err(SolveError::Fatal(err)) => return Err(err),
    };

    Ok(DependencyGraph::new(solution.into_values().collect())?)
}

/// One name's accumulated requirements.
#[derive(Debug, Clone)]
struct Constraint {
    /// Representative declaration; carries the source all others must share
    dep: Dependency,

    /// Every declaration: (declared by, dependency)
    all: Vec<(String, Dependency)>,
}

impl Constraint {
    fn declarers(&self) -> impl Iterator<Item = &str> {
        self.all.iter().map(|(by, _)| by.as_str())
    }

    fn satisfied_by(&self, version: &semver::Version) -> bool {
        self.all.iter().all(|(_, dep)| dep.matches_version(version))
    }
}

/// The minimised set of names whose constraints produced a dead end, plus a
/// rendered explanation. Used to jump back past frames that did not
/// contribute.
#[derive(Debug, Clone)]
struct Conflict {
    names: BTreeSet<String>,
    detail: String,
}

impl Conflict {
    fn merge(&mut self, other: Conflict) {
        self.names.extend(other.names);
        if !self.detail.contains(&other.detail) {
            self.detail.push('\n');
            self.detail.push_str(&other.detail);
        }
    }
}

enum SolveError {
    Conflict(Conflict),
    Fatal(anyhow::Error),
}

/// Whether two declarations agree on where the package comes from.
///
/// Registrations from different sources for the same name are disallowed.
fn same_source(a: &Dependency, b: &Dependency) -> bool {
    match (a, b) {
        (
            Dependency::Registry { registry: ra, .. },
            Dependency::Registry { registry: rb, .. },
        ) => ra == rb,
        (Dependency::Path { path: pa, .. }, Dependency::Path { path: pb, .. }) => pa == pb,
        (
            Dependency::Git {
                url: ua,
                reference: fa,
                ..
            },
            Dependency::Git {
                url: ub,
                reference: fb,
                ..
            },
        ) => ua == ub && fa == fb,
        _ => false,
    }
}

fn merge_constraint(
    constraints: &mut BTreeMap<String, Constraint>,
    dep: &Dependency,
    declared_by: &str,
) -> Result<(), Conflict> {
    match constraints.get_mut(dep.name()) {
        None => {
            constraints.insert(
                dep.name().to_string(),
                Constraint {
                    dep: dep.clone(),
                    all: vec![(declared_by.to_string(), dep.clone())],
                },
            );
            Ok(())
        }
        Some(existing) => {
            if !same_source(&existing.dep, dep) {
                let mut names: BTreeSet<String> =
                    existing.declarers().map(str::to_string).collect();
                names.insert(declared_by.to_string());
                names.insert(dep.name().to_string());
                return Err(Conflict {
                    detail: format!(
                        "`{}` is required from conflicting sources:\n  `{}` requires {}\n  `{}` requires {}",
                        dep.name(),
                        existing.all[0].0,
                        existing.dep,
                        declared_by,
                        dep
                    ),
                    names,
                });
            }
            existing.all.push((declared_by.to_string(), dep.clone()));
            Ok(())
        }
    }
}

fn unsatisfiable(name: &str, constraint: &Constraint) -> Conflict {
    let mut names: BTreeSet<String> = constraint.declarers().map(str::to_string).collect();
    names.insert(name.to_string());

    let mut detail = format!("no version of `{}` satisfies:", name);
    for (by, dep) in &constraint.all {
        detail.push_str(&format!("\n  `{}` requires {}", by, dep));
    }
    Conflict { names, detail }
}

struct Solver<'a> {
    sources: &'a dyn CandidateSource,
    locked: HashMap<String, Registration>,

    /// Raw candidate lists by name; one source per name makes this sound
    cache: RefCell<HashMap<String, Vec<Registration>>>,
}

impl<'a> Solver<'a> {
    fn raw_candidates(&self, constraint: &Constraint) -> Result<Vec<Registration>> {
        let name = constraint.dep.name();
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(cached.clone());
        }

        let candidates = self.sources.candidates(&constraint.dep)?;
        self.cache
            .borrow_mut()
            .insert(name.to_string(), candidates.clone());
        Ok(candidates)
    }

    /// Candidates satisfying the accumulated constraint, in preference
    /// order: the locked version first, then descending SemVer.
    fn candidates(&self, name: &str, constraint: &Constraint) -> Result<Vec<Registration>> {
        let mut matching: Vec<Registration> = self
            .raw_candidates(constraint)?
            .into_iter()
            .filter(|reg| constraint.satisfied_by(reg.version()))
            .collect();

        matching.sort_by(|a, b| b.version().cmp(a.version()));

        if let Some(locked) = self.locked.get(name) {
            if let Some(pos) = matching
                .iter()
                .position(|reg| reg.version() == locked.version())
            {
                let preferred = matching.remove(pos);
                matching.insert(0, preferred);
            }
        }

        Ok(matching)
    }

    /// Pick the next unresolved name: locked first, fewest candidates
    /// next, name as the tie-break.
    fn pick_next(
        &self,
        constraints: &BTreeMap<String, Constraint>,
        assigned: &BTreeMap<String, Registration>,
    ) -> Result<Option<String>> {
        let mut best: Option<(bool, usize, String)> = None;

        for (name, constraint) in constraints {
            if assigned.contains_key(name) {
                continue;
            }
            let count = self.candidates(name, constraint)?.len();
            let key = (!self.locked.contains_key(name), count, name.clone());
            if best.as_ref().map(|b| key < *b).unwrap_or(true) {
                best = Some(key);
            }
        }

        Ok(best.map(|(_, _, name)| name))
    }

    fn solve(
        &self,
        constraints: BTreeMap<String, Constraint>,
        assigned: BTreeMap<String, Registration>,
    ) -> Result<BTreeMap<String, Registration>, SolveError> {
        let name = match self.pick_next(&constraints, &assigned) {
            Ok(Some(name)) => name,
            Ok(None) => return Ok(assigned),
            Err(err) => return Err(SolveError::Fatal(err)),
        };
        let constraint = constraints.get(&name).expect("picked name has constraint");

        let candidates = self
            .candidates(&name, constraint)
            .map_err(SolveError::Fatal)?;
        if candidates.is_empty() {
            return Err(SolveError::Conflict(unsatisfiable(&name, constraint)));
        }

        fn record(conflict: Conflict, accumulated: &mut Option<Conflict>) {
            match accumulated {
                Some(existing) => existing.merge(conflict),
                None => *accumulated = Some(conflict),
            }
        }
        let mut accumulated: Option<Conflict> = None;

        for candidate in candidates {
            // Extend the constraint set with the candidate's own
            // dependencies, intersecting any existing constraints.
            let mut next_constraints = constraints.clone();
            let mut failure: Option<Conflict> = None;

            for dep in candidate.dependencies() {
                if let Err(conflict) = merge_constraint(&mut next_constraints, dep, &name) {
                    failure = Some(conflict);
                    break;
                }
                if let Some(existing) = assigned.get(dep.name()) {
                    if !dep.matches_version(existing.version()) {
                        let merged = next_constraints
                            .get(dep.name())
                            .expect("constraint just merged");
                        let mut conflict = unsatisfiable(dep.name(), merged);
                        conflict.names.insert(name.clone());
                        failure = Some(conflict);
                        break;
                    }
                }
            }

            if let Some(conflict) = failure {
                record(conflict, &mut accumulated);
                continue;
            }

            let mut next_assigned = assigned.clone();
            next_assigned.insert(name.clone(), candidate);

            match self.solve(next_constraints, next_assigned) {
                Ok(solution) => return Ok(solution),
                Err(SolveError::Fatal(err)) => return Err(SolveError::Fatal(err)),
                Err(SolveError::Conflict(conflict)) => {
                    // Jumpback: if this decision did not contribute to the
                    // conflict, trying other candidates here cannot help.
                    if !conflict.names.contains(&name) {
                        return Err(SolveError::Conflict(conflict));
                    }
                    record(conflict, &mut accumulated);
                }
            }
        }

        Err(SolveError::Conflict(accumulated.unwrap_or_else(|| {
            unsatisfiable(&name, constraint)
        })))
    }
}
