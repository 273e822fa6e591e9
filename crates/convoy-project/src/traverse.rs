//! Dependency-ordered traversal of a project's services.
//!
//! Each round plans a depth-first walk over the live dependency edges,
//! then launches one task per selected service. Tasks order themselves by
//! waiting on their dependencies' latches. A round that ends with a
//! restart request reloads and runs again.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use convoy_compose::relationship::ServiceRelationship;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::error::ProjectError;
use crate::events::EventType;
use crate::project::Project;
use crate::service::ServiceAction;
use crate::wrapper::{Outcome, ServiceWrapper, WrapperMap};

/// What a verb does to each service.
#[derive(Clone)]
pub(crate) struct Task {
    start: EventType,
    done: EventType,
    wait_for_dependencies: bool,
    action: ServiceAction,
    cycle_action: Option<ServiceAction>,
}

impl Task {
    /// A task whose services wait for their dependencies.
    pub(crate) fn ordered(start: EventType, done: EventType, action: ServiceAction) -> Self {
        Self {
            start,
            done,
            wait_for_dependencies: true,
            action,
            cycle_action: None,
        }
    }

    /// A task whose services all run at once.
    pub(crate) fn unordered(start: EventType, done: EventType, action: ServiceAction) -> Self {
        Self {
            wait_for_dependencies: false,
            ..Self::ordered(start, done, action)
        }
    }

    /// Action run against the target of every broken cycle edge.
    pub(crate) fn with_cycle_action(mut self, action: ServiceAction) -> Self {
        self.cycle_action = Some(action);
        self
    }
}

/// Services a verb applies to; empty selects everything.
struct Selection(BTreeSet<String>);

impl Selection {
    fn new(services: &[&str]) -> Self {
        Self(services.iter().map(ToString::to_string).collect())
    }

    fn contains(&self, name: &str) -> bool {
        self.0.is_empty() || self.0.contains(name)
    }
}

impl Project {
    /// Runs `task` over the selected services until no restart is requested.
    pub(crate) async fn for_each(&self, services: &[&str], task: &Task) -> Result<(), ProjectError> {
        let selection = Selection::new(services);
        let mut wrappers = WrapperMap::new();
        let mut pending = self.service_names();
        let _ = self.take_reload();

        loop {
            for name in &pending {
                let _ = wrappers.insert(name.clone(), ServiceWrapper::new(name, self)?);
            }
            if let Some(unknown) = selection.0.iter().find(|name| !wrappers.contains_key(*name)) {
                return Err(ProjectError::NoSuchService(unknown.clone()));
            }

            let round = Arc::new(wrappers.clone());
            let restart = self.run_round(&round, &selection, task).await?;
            if !restart {
                return Ok(());
            }

            tracing::info!(project = %self.name(), "restart requested, reloading");
            self.run_reload_callback();

            for wrapper in wrappers.values() {
                wrapper.reset(self)?;
            }
            pending = self.take_reload();
        }
    }

    /// Runs one round. Returns whether a restart was requested.
    async fn run_round(
        &self,
        wrappers: &Arc<WrapperMap>,
        selection: &Selection,
        task: &Task,
    ) -> Result<bool, ProjectError> {
        let plan = Planner::new(wrappers, selection).plan()?;

        if let Some(cycle_action) = &task.cycle_action {
            for target in &plan.cycle_targets {
                let Some(wrapper) = wrappers.get(target) else {
                    continue;
                };
                match cycle_action(wrapper.service()).await {
                    Err(e) if !e.is_restart() => {
                        return Err(ProjectError::Action {
                            service: target.clone(),
                            source: Arc::new(e),
                        });
                    }
                    _ => {}
                }
            }
        }

        for step in plan.steps {
            match step {
                Step::Launch(wrapper) => {
                    let dependencies = task.wait_for_dependencies.then(|| Arc::clone(wrappers));
                    let task = task.clone();
                    drop(tokio::spawn(async move {
                        wrapper
                            .run(dependencies.as_deref(), task.start, task.done, &task.action)
                            .await;
                    }));
                }
                Step::Ignore(wrapper) => wrapper.ignore(),
            }
        }

        let mut restart = false;
        let mut failure = None;
        for wrapper in wrappers.values().filter(|w| selection.contains(w.name())) {
            match wrapper.wait().await {
                Outcome::Success => {}
                Outcome::Restart => restart = true,
                Outcome::Failed(source) => {
                    if failure.is_none() {
                        failure = Some(ProjectError::Action {
                            service: wrapper.name().to_string(),
                            source,
                        });
                    }
                }
            }
        }

        match failure {
            Some(e) if !restart => Err(e),
            _ => Ok(restart),
        }
    }
}

enum Step {
    Launch(Arc<ServiceWrapper>),
    Ignore(Arc<ServiceWrapper>),
}

#[derive(Default)]
struct Plan {
    cycle_targets: Vec<String>,
    steps: Vec<Step>,
}

struct PathEntry {
    name: String,
    /// Whether the edge that led here may be broken.
    optional: bool,
}

/// Depth-first planner over the live dependency edges of one round.
struct Planner<'a> {
    wrappers: &'a WrapperMap,
    selection: &'a Selection,
    visited: HashSet<String>,
    path: Vec<PathEntry>,
    /// Every live edge seen, `(source, target)`.
    edges: Vec<(String, String)>,
    plan: Plan,
}

impl<'a> Planner<'a> {
    fn new(wrappers: &'a WrapperMap, selection: &'a Selection) -> Self {
        Self {
            wrappers,
            selection,
            visited: HashSet::new(),
            path: Vec::new(),
            edges: Vec::new(),
            plan: Plan::default(),
        }
    }

    fn plan(mut self) -> Result<Plan, ProjectError> {
        let wrappers = self.wrappers;
        for wrapper in wrappers.values() {
            self.visit(wrapper, false)?;
        }
        self.check_awaited_edges()?;
        Ok(self.plan)
    }

    fn visit(&mut self, wrapper: &Arc<ServiceWrapper>, optional: bool) -> Result<(), ProjectError> {
        if !self.visited.insert(wrapper.name().to_string()) {
            return Ok(());
        }
        self.path.push(PathEntry {
            name: wrapper.name().to_string(),
            optional,
        });

        let wrappers = self.wrappers;
        for dep in wrapper.service().dependent_services() {
            let Some(target) = wrappers.get(&dep.target) else {
                tracing::error!(service = %wrapper.name(), dependency = %dep.target, "failed to find dependency");
                continue;
            };
            self.edges
                .push((wrapper.name().to_string(), dep.target.clone()));
            if let Some(start) = self.path.iter().position(|entry| entry.name == dep.target) {
                self.break_cycle(wrapper, &dep, start)?;
                continue;
            }
            self.visit(target, dep.optional)?;
        }

        let _ = self.path.pop();
        let step = if self.selection.contains(wrapper.name()) {
            Step::Launch(Arc::clone(wrapper))
        } else {
            Step::Ignore(Arc::clone(wrapper))
        };
        self.plan.steps.push(step);
        Ok(())
    }

    /// Handles the back-edge `source -> dep.target`, where the target sits
    /// at `path[start]`.
    fn break_cycle(
        &mut self,
        source: &ServiceWrapper,
        dep: &ServiceRelationship,
        start: usize,
    ) -> Result<(), ProjectError> {
        if dep.optional {
            self.ignore_edge(source, &dep.target);
            return Ok(());
        }

        let breakable = (start + 1..self.path.len())
            .rev()
            .find(|&i| self.path[i].optional);
        if let Some(i) = breakable {
            let wrappers = self.wrappers;
            let target = self.path[i].name.clone();
            if let Some(from) = wrappers.get(&self.path[i - 1].name) {
                self.ignore_edge(from, &target);
                return Ok(());
            }
        }

        let mut names: Vec<&str> = self.path.iter().map(|entry| entry.name.as_str()).collect();
        names.push(&dep.target);
        Err(ProjectError::Cycle {
            path: names.join("->"),
        })
    }

    /// Fails if the edges still awaited after cycle breaking form a cycle.
    ///
    /// Breaking an edge earlier on the path can leave a second cycle
    /// through nodes that were already visited; the depth-first walk never
    /// sees it again, so it is checked here on the whole graph.
    fn check_awaited_edges(&self) -> Result<(), ProjectError> {
        let mut graph = DiGraphMap::<&str, ()>::new();
        for (source, target) in &self.edges {
            if self.wrappers.get(source).is_some_and(|w| !w.ignores(target)) {
                let _ = graph.add_edge(source.as_str(), target.as_str(), ());
            }
        }

        for component in tarjan_scc(&graph) {
            let Some(&start) = component.iter().min() else {
                continue;
            };
            if component.len() > 1 || graph.contains_edge(start, start) {
                let members: HashSet<&str> = component.iter().copied().collect();
                let mut path = vec![start];
                let _ = close_cycle(&graph, &members, &mut path, &mut HashSet::from([start]));
                return Err(ProjectError::Cycle {
                    path: path.join("->"),
                });
            }
        }
        Ok(())
    }

    fn ignore_edge(&mut self, source: &ServiceWrapper, target: &str) {
        tracing::debug!(service = %source.name(), dependency = target, "breaking dependency cycle");
        source.ignore_dep(target);
        if !self.plan.cycle_targets.iter().any(|t| t == target) {
            self.plan.cycle_targets.push(target.to_string());
        }
    }
}

/// Extends `path` inside `members` until it returns to its first node.
fn close_cycle<'g>(
    graph: &DiGraphMap<&'g str, ()>,
    members: &HashSet<&'g str>,
    path: &mut Vec<&'g str>,
    seen: &mut HashSet<&'g str>,
) -> bool {
    let (Some(&start), Some(&current)) = (path.first(), path.last()) else {
        return false;
    };
    let mut next: Vec<&str> = graph
        .neighbors(current)
        .filter(|n| members.contains(n))
        .collect();
    next.sort_unstable();

    for node in next {
        if node == start {
            path.push(node);
            return true;
        }
        if seen.insert(node) {
            path.push(node);
            if close_cycle(graph, members, path, seen) {
                return true;
            }
            let _ = path.pop();
        }
    }
    false
}
