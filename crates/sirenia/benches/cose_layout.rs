use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sirenia::{CoseOptions, Edge, Graph, Node};
use std::hint::black_box;
use std::time::Duration;

fn leaf(id: String, parent: Option<String>) -> Node {
    Node {
        id,
        width: 40.0,
        height: 30.0,
        parent,
        ..Default::default()
    }
}

/// `groups` compounds of `per_group` nodes each. Every group is a ring with chords, and
/// consecutive groups are joined by one inter-graph edge.
fn build_compound_graph(groups: usize, per_group: usize) -> Graph {
    let mut nodes: Vec<Node> = Vec::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut edge = |s: String, t: String| {
        edges.push(Edge {
            id: format!("{s}->{t}"),
            source: s,
            target: t,
            bend_points: Vec::new(),
        });
    };

    for g in 0..groups {
        let group = format!("g{g}");
        nodes.push(leaf(group.clone(), None));
        for i in 0..per_group {
            nodes.push(leaf(format!("g{g}_n{i}"), Some(group.clone())));
            edge(format!("g{g}_n{i}"), format!("g{g}_n{}", (i + 1) % per_group));
            if i % 3 == 0 {
                edge(format!("g{g}_n{i}"), format!("g{g}_n{}", (i + per_group / 2) % per_group));
            }
        }
        if g > 0 {
            edge(format!("g{}_n0", g - 1), format!("g{g}_n{}", per_group / 2));
        }
    }
    Graph { nodes, edges }
}

fn bench_cose_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("cose_layout");
    group.measurement_time(Duration::from_secs(10));

    let cases = [
        ("compound_4x10", 4usize, 10usize),
        ("compound_8x20", 8usize, 20usize),
        ("compound_16x25", 16usize, 25usize),
    ];

    let opts = CoseOptions {
        random_seed: 7,
        ..Default::default()
    };
    for (name, groups, per_group) in cases {
        let graph = build_compound_graph(groups, per_group);
        group.bench_with_input(BenchmarkId::new("layout", name), &graph, |b, graph| {
            b.iter(|| {
                let result = sirenia::layout(black_box(graph), &opts).expect("layout");
                black_box(result.iterations);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cose_layout);
criterion_main!(benches);
