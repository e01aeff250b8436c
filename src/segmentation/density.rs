use std::collections::VecDeque;

use rstar::primitives::GeomWithData;
use rstar::RTree;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// DBSCAN over 2-D points. Returns clusters as ascending point indices,
/// ordered by their first core point; noise points are left out.
///
/// A point is a core point when at least `min_samples` points (itself
/// included) lie within `eps`.
pub fn dbscan(points: &[[f64; 2]], eps: f64, min_samples: usize) -> Vec<Vec<usize>> {
    if points.is_empty() {
        return Vec::new();
    }
    let tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new(*p, i))
            .collect(),
    );
    let eps_2 = eps * eps;
    let neighbours = |i: usize| -> Vec<usize> {
        let mut found: Vec<usize> = tree
            .locate_within_distance(points[i], eps_2)
            .map(|p| p.data)
            .collect();
        found.sort_unstable();
        found
    };

    let mut assigned: Vec<Option<usize>> = vec![None; points.len()];
    let mut visited = vec![false; points.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for seed in 0..points.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let seed_neighbours = neighbours(seed);
        if seed_neighbours.len() < min_samples {
            continue;
        }

        let cluster_id = clusters.len();
        let mut members = vec![seed];
        assigned[seed] = Some(cluster_id);
        let mut queue: VecDeque<usize> = seed_neighbours.into_iter().collect();

        while let Some(point) = queue.pop_front() {
            if assigned[point].is_none() {
                assigned[point] = Some(cluster_id);
                members.push(point);
            }
            if visited[point] {
                continue;
            }
            visited[point] = true;
            let reach = neighbours(point);
            if reach.len() >= min_samples {
                queue.extend(reach.into_iter().filter(|&n| assigned[n].is_none()));
            }
        }
        members.sort_unstable();
        clusters.push(members);
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn groups_dense_points_and_skips_noise() {
        let points = vec![
            [0.0, 0.0],
            [50.0, 0.0],
            [100.0, 0.0],
            [1000.0, 1000.0],
            [400.0, 400.0],
            [440.0, 420.0],
        ];
        let clusters = dbscan(&points, 80.0, 2);
        assert_eq!(clusters, vec![vec![0, 1, 2], vec![4, 5]]);
    }

    #[test]
    fn eps_boundary_is_inclusive() {
        let points = vec![[0.0, 0.0], [80.0, 0.0]];
        assert_eq!(dbscan(&points, 80.0, 2), vec![vec![0, 1]]);
        assert!(dbscan(&points, 79.9, 2).is_empty());
    }

    #[test]
    fn border_points_join_but_do_not_expand() {
        // 2 borders the cluster seeded at 1; 3 is out of reach.
        let points = vec![[0.0, 0.0], [10.0, 0.0], [60.0, 0.0], [115.0, 0.0]];
        let clusters = dbscan(&points, 50.0, 3);
        assert_eq!(clusters, vec![vec![0, 1, 2]]);
    }
}
