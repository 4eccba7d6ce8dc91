use super::graph::DependencyGraph;
use super::vertex::VertexId;
use rustc_hash::{FxHashMap, FxHashSet};

pub struct Scheduler<'a> {
    graph: &'a DependencyGraph,
}

/// Vertices and cycles whose inputs are all produced by earlier layers.
#[derive(Debug, Default)]
pub struct Layer {
    pub vertices: Vec<VertexId>,
    pub cycles: Vec<Vec<VertexId>>,
}

#[derive(Debug, Default)]
pub struct Schedule {
    pub layers: Vec<Layer>,
    /// Every non-trivial strongly connected component, in layer order.
    pub cycles: Vec<Vec<VertexId>>,
}

impl Schedule {
    pub fn vertex_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.vertices.len() + l.cycles.iter().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Acyclic vertices in evaluation order.
    pub fn flattened(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.layers.iter().flat_map(|l| l.vertices.iter().copied())
    }
}

impl<'a> Scheduler<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// Order `vertices` so that each comes after its dependencies within the
    /// set. Edges leaving the set are ignored.
    pub fn create_schedule(&self, vertices: &[VertexId]) -> Schedule {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("create_schedule", vertices = vertices.len()).entered();

        let mut sorted: Vec<VertexId> = vertices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let members: FxHashSet<VertexId> = sorted.iter().copied().collect();

        let sccs = self.tarjan_scc(&sorted, &members);
        let layers = self.build_layers(sccs, &members);
        let cycles = layers.iter().flat_map(|l| l.cycles.iter().cloned()).collect();
        Schedule { layers, cycles }
    }

    fn dependencies_within(&self, vertex: VertexId, members: &FxHashSet<VertexId>) -> Vec<VertexId> {
        let mut deps: Vec<VertexId> = self
            .graph
            .vertex(vertex)
            .map(|v| {
                v.dependencies()
                    .iter()
                    .copied()
                    .filter(|d| members.contains(d))
                    .collect()
            })
            .unwrap_or_default();
        deps.sort_unstable();
        deps
    }

    /// Tarjan's strongly connected components, iterative so long chains do not
    /// exhaust the stack. Components come out dependencies-first.
    pub fn tarjan_scc(
        &self,
        vertices: &[VertexId],
        members: &FxHashSet<VertexId>,
    ) -> Vec<Vec<VertexId>> {
        let mut index_counter = 0usize;
        let mut indices: FxHashMap<VertexId, usize> = FxHashMap::default();
        let mut lowlinks: FxHashMap<VertexId, usize> = FxHashMap::default();
        let mut stack: Vec<VertexId> = Vec::new();
        let mut on_stack: FxHashSet<VertexId> = FxHashSet::default();
        let mut sccs = Vec::new();

        for &root in vertices {
            if indices.contains_key(&root) {
                continue;
            }
            // (vertex, remaining successors)
            let mut work: Vec<(VertexId, Vec<VertexId>)> = Vec::new();
            indices.insert(root, index_counter);
            lowlinks.insert(root, index_counter);
            index_counter += 1;
            stack.push(root);
            on_stack.insert(root);
            work.push((root, self.dependencies_within(root, members)));

            while let Some((vertex, successors)) = work.last_mut() {
                let vertex = *vertex;
                if let Some(next) = successors.pop() {
                    if !indices.contains_key(&next) {
                        indices.insert(next, index_counter);
                        lowlinks.insert(next, index_counter);
                        index_counter += 1;
                        stack.push(next);
                        on_stack.insert(next);
                        work.push((next, self.dependencies_within(next, members)));
                    } else if on_stack.contains(&next) {
                        let low = lowlinks[&vertex].min(indices[&next]);
                        lowlinks.insert(vertex, low);
                    }
                    continue;
                }

                work.pop();
                if let Some((parent, _)) = work.last() {
                    let low = lowlinks[parent].min(lowlinks[&vertex]);
                    lowlinks.insert(*parent, low);
                }
                if lowlinks[&vertex] == indices[&vertex] {
                    let mut scc = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack.remove(&w);
                        scc.push(w);
                        if w == vertex {
                            break;
                        }
                    }
                    scc.sort_unstable();
                    sccs.push(scc);
                }
            }
        }
        sccs
    }

    fn is_cycle(&self, scc: &[VertexId]) -> bool {
        match scc {
            [single] => self.has_self_loop(*single),
            _ => scc.len() > 1,
        }
    }

    fn has_self_loop(&self, vertex: VertexId) -> bool {
        self.graph
            .vertex(vertex)
            .is_some_and(|v| v.dependencies().contains(&vertex))
    }

    /// Kahn's algorithm over the condensation: each layer holds every
    /// component whose in-set dependencies are all in earlier layers.
    fn build_layers(&self, sccs: Vec<Vec<VertexId>>, members: &FxHashSet<VertexId>) -> Vec<Layer> {
        let mut component_of: FxHashMap<VertexId, usize> = FxHashMap::default();
        for (c, scc) in sccs.iter().enumerate() {
            for v in scc {
                component_of.insert(*v, c);
            }
        }

        let mut in_degree = vec![0usize; sccs.len()];
        let mut downstream: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); sccs.len()];
        for (c, scc) in sccs.iter().enumerate() {
            for v in scc {
                for dep in self.dependencies_within(*v, members) {
                    let d = component_of[&dep];
                    if d != c && downstream[d].insert(c) {
                        in_degree[c] += 1;
                    }
                }
            }
        }

        let mut ready: Vec<usize> = (0..sccs.len()).filter(|c| in_degree[*c] == 0).collect();
        let mut layers = Vec::new();
        while !ready.is_empty() {
            ready.sort_unstable_by_key(|c| sccs[*c][0]);
            let mut layer = Layer::default();
            let mut next = Vec::new();
            for c in ready.drain(..) {
                if self.is_cycle(&sccs[c]) {
                    layer.cycles.push(sccs[c].clone());
                } else {
                    layer.vertices.push(sccs[c][0]);
                }
                for &d in &downstream[c] {
                    in_degree[d] -= 1;
                    if in_degree[d] == 0 {
                        next.push(d);
                    }
                }
            }
            layers.push(layer);
            ready = next;
        }
        layers
    }
}
