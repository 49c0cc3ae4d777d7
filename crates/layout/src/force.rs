//! Force-directed layout.
//!
//! A velocity-Verlet simulation with link, many-body, centering and
//! collision forces, run for a fixed number of ticks with exponential
//! alpha decay. Initial positions are random; pass a seed to reproduce a
//! run. A rectangle relaxation pass afterwards removes any overlap the
//! disc-shaped collision force leaves behind.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::{LayoutGraph, Point};

pub(crate) const LINK_DISTANCE: f64 = 180.0;
pub(crate) const LINK_STRENGTH: f64 = 0.8;
pub(crate) const CHARGE_STRENGTH: f64 = -400.0;
pub(crate) const CHARGE_MAX_DISTANCE: f64 = 500.0;

/// Added to half the node's largest side to get its collision radius.
pub(crate) const COLLIDE_MARGIN: f64 = 20.0;
const COLLIDE_STRENGTH: f64 = 0.7;

pub(crate) const TICKS: usize = 300;
const ALPHA_MIN: f64 = 0.001;
const VELOCITY_DECAY: f64 = 0.4;

/// Minimum clearance enforced between rectangles after the simulation.
const RELAX_GAP: f64 = 10.0;
const RELAX_ITERATIONS: usize = 100;

pub(crate) fn layout(graph: &LayoutGraph<'_>, seed: Option<u64>) -> Vec<Point> {
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    let mut sim = Simulation::new(graph, seed);
    sim.run();
    let centers = sim.relax_overlaps();
    centers
        .into_iter()
        .enumerate()
        .map(|(i, c)| graph.top_left(i, c))
        .collect()
}

struct Body {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

struct Simulation<'g, 'a> {
    graph: &'g LayoutGraph<'a>,
    bodies: Vec<Body>,
    links: Vec<(usize, usize)>,
    /// Share of a link's correction applied to the target.
    bias: Vec<f64>,
    radii: Vec<f64>,
    rng: StdRng,
    alpha: f64,
    alpha_decay: f64,
}

impl<'g, 'a> Simulation<'g, 'a> {
    fn new(graph: &'g LayoutGraph<'a>, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = graph.len();
        let spread = LINK_DISTANCE * (n as f64).sqrt();

        let bodies = (0..n)
            .map(|_| Body {
                x: rng.random_range(-spread..=spread),
                y: rng.random_range(-spread..=spread),
                vx: 0.0,
                vy: 0.0,
            })
            .collect();

        let links = graph.edge_pairs();
        let mut count = vec![0usize; n];
        for &(s, t) in &links {
            count[s] += 1;
            count[t] += 1;
        }
        let bias = links
            .iter()
            .map(|&(s, t)| count[s] as f64 / (count[s] + count[t]) as f64)
            .collect();

        let radii = (0..n).map(|i| graph.extent(i) / 2.0 + COLLIDE_MARGIN).collect();

        Self {
            graph,
            bodies,
            links,
            bias,
            radii,
            rng,
            alpha: 1.0,
            alpha_decay: 1.0 - ALPHA_MIN.powf(1.0 / TICKS as f64),
        }
    }

    fn run(&mut self) {
        for _ in 0..TICKS {
            self.alpha += (0.0 - self.alpha) * self.alpha_decay;
            self.apply_links();
            self.apply_charge();
            self.apply_collision();
            for body in &mut self.bodies {
                body.vx *= 1.0 - VELOCITY_DECAY;
                body.vy *= 1.0 - VELOCITY_DECAY;
                body.x += body.vx;
                body.y += body.vy;
            }
            self.apply_center();
        }
    }

    /// Tiny random offset used when two bodies coincide.
    fn jiggle(&mut self) -> f64 {
        (self.rng.random::<f64>() - 0.5) * 1e-6
    }

    fn apply_links(&mut self) {
        for k in 0..self.links.len() {
            let (s, t) = self.links[k];
            let mut dx = self.bodies[t].x + self.bodies[t].vx - self.bodies[s].x - self.bodies[s].vx;
            let mut dy = self.bodies[t].y + self.bodies[t].vy - self.bodies[s].y - self.bodies[s].vy;
            if dx == 0.0 {
                dx = self.jiggle();
            }
            if dy == 0.0 {
                dy = self.jiggle();
            }
            let len = dx.hypot(dy);
            let scale = (len - LINK_DISTANCE) / len * self.alpha * LINK_STRENGTH;
            dx *= scale;
            dy *= scale;

            let b = self.bias[k];
            self.bodies[t].vx -= dx * b;
            self.bodies[t].vy -= dy * b;
            self.bodies[s].vx += dx * (1.0 - b);
            self.bodies[s].vy += dy * (1.0 - b);
        }
    }

    fn apply_charge(&mut self) {
        let n = self.bodies.len();
        let max2 = CHARGE_MAX_DISTANCE * CHARGE_MAX_DISTANCE;
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let mut dx = self.bodies[j].x - self.bodies[i].x;
                let mut dy = self.bodies[j].y - self.bodies[i].y;
                if dx == 0.0 {
                    dx = self.jiggle();
                }
                if dy == 0.0 {
                    dy = self.jiggle();
                }
                let mut l2 = dx * dx + dy * dy;
                if l2 >= max2 {
                    continue;
                }
                if l2 < 1.0 {
                    l2 = l2.sqrt();
                }
                let w = CHARGE_STRENGTH * self.alpha / l2;
                self.bodies[i].vx += dx * w;
                self.bodies[i].vy += dy * w;
            }
        }
    }

    fn apply_collision(&mut self) {
        let n = self.bodies.len();
        for i in 0..n {
            for j in i + 1..n {
                let ri = self.radii[i];
                let rj = self.radii[j];
                let reach = ri + rj;
                let mut dx = self.bodies[i].x + self.bodies[i].vx - self.bodies[j].x - self.bodies[j].vx;
                let mut dy = self.bodies[i].y + self.bodies[i].vy - self.bodies[j].y - self.bodies[j].vy;
                let mut l2 = dx * dx + dy * dy;
                if l2 >= reach * reach {
                    continue;
                }
                if dx == 0.0 {
                    dx = self.jiggle();
                    l2 += dx * dx;
                }
                if dy == 0.0 {
                    dy = self.jiggle();
                    l2 += dy * dy;
                }
                let len = l2.sqrt();
                let push = (reach - len) / len * COLLIDE_STRENGTH;
                dx *= push;
                dy *= push;
                let share = (rj * rj) / (ri * ri + rj * rj);
                self.bodies[i].vx += dx * share;
                self.bodies[i].vy += dy * share;
                self.bodies[j].vx -= dx * (1.0 - share);
                self.bodies[j].vy -= dy * (1.0 - share);
            }
        }
    }

    fn apply_center(&mut self) {
        let n = self.bodies.len() as f64;
        let (sx, sy) = self
            .bodies
            .iter()
            .fold((0.0, 0.0), |(sx, sy), b| (sx + b.x, sy + b.y));
        let (cx, cy) = (sx / n, sy / n);
        for body in &mut self.bodies {
            body.x -= cx;
            body.y -= cy;
        }
    }

    /// Push overlapping rectangles apart along their axis of least overlap.
    fn relax_overlaps(&self) -> Vec<Point> {
        let mut centers: Vec<Point> = self.bodies.iter().map(|b| (b.x, b.y)).collect();
        let sizes = &self.graph.sizes;

        for iteration in 0..RELAX_ITERATIONS {
            let mut moved = false;
            for i in 0..centers.len() {
                for j in i + 1..centers.len() {
                    let dx = centers[j].0 - centers[i].0;
                    let dy = centers[j].1 - centers[i].1;
                    let overlap_x = (sizes[i].width + sizes[j].width) / 2.0 + RELAX_GAP - dx.abs();
                    let overlap_y = (sizes[i].height + sizes[j].height) / 2.0 + RELAX_GAP - dy.abs();
                    if overlap_x <= 0.0 || overlap_y <= 0.0 {
                        continue;
                    }
                    moved = true;
                    if overlap_x < overlap_y {
                        let shift = overlap_x / 2.0 * if dx < 0.0 { -1.0 } else { 1.0 };
                        centers[i].0 -= shift;
                        centers[j].0 += shift;
                    } else {
                        let shift = overlap_y / 2.0 * if dy < 0.0 { -1.0 } else { 1.0 };
                        centers[i].1 -= shift;
                        centers[j].1 += shift;
                    }
                }
            }
            if !moved {
                tracing::trace!(iteration, "Force layout overlap relaxation converged");
                break;
            }
        }
        centers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{edge, node};
    use crate::types::{GraphEdge, GraphNode, Rect};
    use lineage_core::dimensions::DimensionMap;

    fn rects(nodes: &[GraphNode], edges: &[GraphEdge], seed: Option<u64>) -> Vec<(String, Rect)> {
        let node_refs: Vec<&GraphNode> = nodes.iter().collect();
        let edge_refs: Vec<&GraphEdge> = edges.iter().collect();
        let graph = LayoutGraph::build(&node_refs, &edge_refs, &DimensionMap::new());
        layout(&graph, seed)
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| {
                let rect = Rect {
                    x,
                    y,
                    width: graph.sizes[i].width,
                    height: graph.sizes[i].height,
                };
                (graph.nodes[i].id.clone(), rect)
            })
            .collect()
    }

    fn center(rect: &Rect) -> Point {
        (rect.x + rect.width / 2.0, rect.y + rect.height / 2.0)
    }

    #[test]
    fn nodes_never_overlap() {
        let nodes: Vec<GraphNode> = (0..8).map(|i| node(&format!("n{i}"))).collect();
        let edges: Vec<GraphEdge> = (1..8).map(|i| edge("n0", &format!("n{i}"))).collect();

        for seed in [1, 2, 3] {
            let placed = rects(&nodes, &edges, Some(seed));
            for (i, (a_id, a)) in placed.iter().enumerate() {
                for (b_id, b) in &placed[i + 1..] {
                    assert!(!a.intersects(b), "seed {seed}: {a_id} overlaps {b_id}");
                }
            }
        }
    }

    #[test]
    fn linked_pair_settles_near_link_distance() {
        let nodes = [node("a"), node("b")];
        let edges = [edge("a", "b")];
        let placed = rects(&nodes, &edges, Some(42));

        let (ax, ay) = center(&placed[0].1);
        let (bx, by) = center(&placed[1].1);
        let distance = (ax - bx).hypot(ay - by);
        assert!(
            (150.0..=320.0).contains(&distance),
            "distance {distance} outside tolerance"
        );
    }

    #[test]
    fn same_seed_reproduces_positions() {
        let nodes = [node("a"), node("b"), node("c")];
        let edges = [edge("a", "b"), edge("b", "c")];
        let first = rects(&nodes, &edges, Some(9));
        let second = rects(&nodes, &edges, Some(9));
        assert_eq!(first, second);
    }
}
