use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use lbm_cascade::config::RankGridConfig;
use lbm_cascade::decomp::RankTopology;
use lbm_cascade::grid::{GridNode, IndexBox, SiteField};
use lbm_cascade::kernel;
use lbm_cascade::model;

fn node_of_size(n: usize) -> GridNode {
    let topo = RankTopology::build(0, 1, RankGridConfig { px: 1, py: 1 }).unwrap();
    let owned = topo.domain_slab(n, n).unwrap();
    let mut node = GridNode {
        level: 0,
        region: 0,
        origin: [0.0, 0.0],
        dx: 1.0,
        omega: GridNode::omega_for_level(0.02, 0),
        global: IndexBox::new(0, n, 0, n),
        owned,
        field: SiteField::new(n, n),
        parent: None,
        children: Vec::new(),
    };
    // shear the field a little so the kernel is not relaxing a fixed point
    for j in 1..=n {
        for i in 1..=n {
            let s = node.field.idx(i, j);
            let u = [0.02 * (j as f64 / n as f64), 0.0];
            for q in 0..model::Q {
                node.field.f[s][q] = model::equilibrium(q, 1.0, u);
            }
            node.field.recompute_moments(s);
        }
    }
    node
}

fn bench_collide_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("collide_stream");
    for n in [32usize, 64, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut node = node_of_size(n);
            b.iter(|| kernel::step(&mut node, [0.0; 2]));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_collide_stream);
criterion_main!(benches);
