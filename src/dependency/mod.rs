//! Dependency analyzer (§4.3): builds a directed graph over tags from
//! dynamic formatter arguments that reference another tag's path,
//! topologically orders it, and flags cycles.
//!
//! Grounded on the teacher's `ast/query/traversal.rs` graph-walk shape,
//! generalized from a tree walk to a general directed graph (this domain's
//! dependency graph is not guaranteed acyclic until checked).

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::TemplateError;
use crate::parser::{Arg, Path, Tag, TagId};

/// The tag dependency graph plus its topological order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<TagId, Vec<TagId>>,
    pub order: Vec<TagId>,
}

impl DependencyGraph {
    pub fn dependencies_of(&self, tag: TagId) -> &[TagId] {
        self.edges.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Builds the dependency graph for `tags`: an edge `a -> b` exists when a
/// dynamic formatter argument in tag `a` names a path equal to, or a
/// prefix-extension of, tag `b`'s own path.
pub fn analyze(tags: &[Tag]) -> Result<DependencyGraph, TemplateError> {
    let mut edges: HashMap<TagId, Vec<TagId>> = HashMap::new();
    for tag in tags {
        edges.entry(tag.id).or_default();
    }

    for tag in tags {
        for formatter in &tag.formatters {
            for arg in &formatter.args {
                if let Arg::Dynamic(_, path) = arg {
                    for other in tags {
                        if other.id == tag.id {
                            continue;
                        }
                        if let Some(other_path) = other.path() {
                            if path_matches_or_extends(path, other_path) {
                                edges.entry(tag.id).or_default().push(other.id);
                            }
                        }
                    }
                }
            }
        }
    }

    let order = topological_order(&edges)?;
    Ok(DependencyGraph { edges, order })
}

/// A dynamic argument's path "depends on" a tag's path if the argument's
/// path equals it, or extends it with further segments (a prefix match).
fn path_matches_or_extends(arg_path: &Path, tag_path: &Path) -> bool {
    if arg_path.len() < tag_path.len() {
        return false;
    }
    arg_path
        .iter()
        .zip(tag_path.iter())
        .all(|(a, b)| a.name == b.name)
}

/// Kahn's algorithm. Returns `CIRCULAR_DEPENDENCY` if any tag cannot be
/// ordered (i.e. a cycle remains once all acyclic tags are drained).
fn topological_order(edges: &HashMap<TagId, Vec<TagId>>) -> Result<Vec<TagId>, TemplateError> {
    // `edges` maps tag -> its dependencies, so a tag is only ready once all
    // of its dependencies have been emitted.
    let mut remaining_deps: HashMap<TagId, HashSet<TagId>> = edges
        .iter()
        .map(|(&id, deps)| (id, deps.iter().copied().collect()))
        .collect();

    let mut ready: VecDeque<TagId> = remaining_deps
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(&id, _)| id)
        .collect();
    let mut ready_sorted: Vec<TagId> = ready.iter().copied().collect();
    ready_sorted.sort();
    ready = ready_sorted.into();

    let mut order = Vec::new();
    while let Some(id) = ready.pop_front() {
        order.push(id);
        let mut newly_ready = Vec::new();
        for (&other, deps) in remaining_deps.iter_mut() {
            if deps.remove(&id) && deps.is_empty() {
                newly_ready.push(other);
            }
        }
        newly_ready.sort();
        for id in newly_ready {
            ready.push_back(id);
        }
        remaining_deps.remove(&id);
    }

    if !remaining_deps.is_empty() {
        let mut stuck: Vec<TagId> = remaining_deps.keys().copied().collect();
        stuck.sort();
        return Err(TemplateError::CircularDependency(stuck));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn independent_tags_have_no_edges() {
        let tags = parse("{d.a} {d.b}").unwrap();
        let graph = analyze(&tags).unwrap();
        assert_eq!(graph.order.len(), 2);
        assert!(graph.dependencies_of(tags[0].id).is_empty());
    }

    #[test]
    fn dynamic_argument_creates_an_edge() {
        let tags = parse("{d.total:add(d.items.count)} {d.items.count}").unwrap();
        let graph = analyze(&tags).unwrap();
        assert_eq!(graph.dependencies_of(tags[0].id), &[tags[1].id]);
        assert_eq!(graph.order, vec![tags[1].id, tags[0].id]);
    }

    #[test]
    fn cycle_is_rejected() {
        let tags = parse("{d.a:add(d.b)} {d.b:add(d.a)}").unwrap();
        let err = analyze(&tags).unwrap_err();
        assert!(matches!(err, TemplateError::CircularDependency(_)));
    }

    #[test]
    fn self_reference_is_not_an_edge() {
        let tags = parse("{d.a:add(d.a)}").unwrap();
        let graph = analyze(&tags).unwrap();
        assert!(graph.dependencies_of(tags[0].id).is_empty());
    }
}
