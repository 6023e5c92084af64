//! DependencyGraph - the immutable result of a resolve.
//!
//! An ordered sequence of registrations with three invariants: every
//! listed dependency resolves to exactly one registration whose version
//! satisfies it, no two registrations share a name, and the graph is
//! acyclic when traversed name to dependency.

use std::collections::HashMap;

use crate::core::{Error, Registration};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DependencyGraph {
    /// Registrations in stable alphabetical order by name
    registrations: Vec<Registration>,
}

impl DependencyGraph {
    /// Build a graph, sorting by name and checking every invariant.
    pub fn new(mut registrations: Vec<Registration>) -> Result<Self, Error> {
        registrations.sort_by(|a, b| a.name().cmp(b.name()));

        let by_name: HashMap<&str, &Registration> = registrations
            .iter()
            .map(|reg| (reg.name(), reg))
            .collect();

        if by_name.len() != registrations.len() {
            return Err(Error::ResolveFailed {
                detail: "duplicate registration names in graph".to_string(),
            });
        }

        for reg in &registrations {
            for dep in reg.dependencies() {
                let target = by_name.get(dep.name()).ok_or_else(|| Error::ResolveFailed {
                    detail: format!(
                        "`{}` depends on `{}`, which is not in the graph",
                        reg.name(),
                        dep.name()
                    ),
                })?;

                if !dep.matches_version(target.version()) {
                    return Err(Error::ResolveFailed {
                        detail: format!(
                            "`{}` requires `{}` but the graph pins {}",
                            reg.name(),
                            dep,
                            target.version()
                        ),
                    });
                }
            }
        }

        Self::check_acyclic(&registrations, &by_name)?;

        Ok(DependencyGraph { registrations })
    }

    pub fn empty() -> Self {
        DependencyGraph::default()
    }

    fn check_acyclic(
        registrations: &[Registration],
        by_name: &HashMap<&str, &Registration>,
    ) -> Result<(), Error> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        fn visit<'a>(
            reg: &'a Registration,
            by_name: &HashMap<&str, &'a Registration>,
            marks: &mut HashMap<&'a str, Mark>,
            trail: &mut Vec<&'a str>,
        ) -> Result<(), Error> {
            match marks.get(reg.name()) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::InProgress) => {
                    trail.push(reg.name());
                    return Err(Error::ResolveFailed {
                        detail: format!("dependency cycle: {}", trail.join(" -> ")),
                    });
                }
                None => {}
            }

            marks.insert(reg.name(), Mark::InProgress);
            trail.push(reg.name());
            for dep in reg.dependencies() {
                if let Some(target) = by_name.get(dep.name()) {
                    visit(target, by_name, marks, trail)?;
                }
            }
            trail.pop();
            marks.insert(reg.name(), Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for reg in registrations {
            visit(reg, by_name, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.name() == name)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl<'a> IntoIterator for &'a DependencyGraph {
    type Item = &'a Registration;
    type IntoIter = std::slice::Iter<'a, Registration>;

    fn into_iter(self) -> Self::IntoIter {
        self.registrations.iter()
    }
}
