use crate::infer::weight::type_matrix;
use crate::table::Table;

/// Row role assigned by clustering.
///
/// The names follow the two seed archetypes: cluster 0 is seeded with the
/// all-ones "pure header" vector and cluster 1 with the last row's weights.
/// After re-estimation the index-to-role mapping is not guaranteed, so
/// downstream logic only ever compares labels against the first row's label.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RowLabel {
    Header,
    Data,
}

/// Re-estimation cap; the split stabilizes in a couple of passes in practice.
const MAX_ITERATIONS: usize = 10;

/// Partitions the rows of a table into two clusters over their type weights.
///
/// Seeds: (a) a vector of all 1s, the pure-header archetype, and (b) the
/// weight vector of the last row, on the assumption the final row is data.
///
/// With a single row or a constant matrix the split is degenerate; whatever
/// assignment the procedure settles on is returned as-is, and a table that
/// lands entirely in one cluster reads as having no header downstream.
pub fn classify_rows(table: &Table) -> Vec<RowLabel> {
    let matrix = type_matrix(table);
    let labels = two_means(&matrix);
    tracing::debug!(rows = labels.len(), "clustered table rows");
    labels
        .into_iter()
        .map(|index| {
            if index == 0 {
                RowLabel::Header
            } else {
                RowLabel::Data
            }
        })
        .collect()
}

/// Seeded 2-means over row vectors. Returns the cluster index per row.
fn two_means(matrix: &[Vec<f64>]) -> Vec<usize> {
    let Some(last) = matrix.last() else {
        return Vec::new();
    };
    let mut centroids = [vec![1.0; last.len()], last.clone()];
    let mut labels = assign(matrix, &centroids);
    for _ in 0..MAX_ITERATIONS {
        update(matrix, &labels, &mut centroids);
        let next = assign(matrix, &centroids);
        if next == labels {
            break;
        }
        labels = next;
    }
    labels
}

/// Assigns each row to the nearest centroid; ties go to the lower index.
fn assign(matrix: &[Vec<f64>], centroids: &[Vec<f64>; 2]) -> Vec<usize> {
    matrix
        .iter()
        .map(|row| {
            let near = distance_squared(row, &centroids[0]);
            let far = distance_squared(row, &centroids[1]);
            usize::from(far < near)
        })
        .collect()
}

/// Re-estimates centroids as member means. A cluster that lost every member
/// keeps its previous centroid.
fn update(matrix: &[Vec<f64>], labels: &[usize], centroids: &mut [Vec<f64>; 2]) {
    for cluster in 0..2 {
        let members: Vec<&Vec<f64>> = matrix
            .iter()
            .zip(labels)
            .filter(|(_, label)| **label == cluster)
            .map(|(row, _)| row)
            .collect();
        if members.is_empty() {
            continue;
        }
        let mut mean = vec![0.0; centroids[cluster].len()];
        for row in &members {
            for (total, value) in mean.iter_mut().zip(row.iter()) {
                *total += value;
            }
        }
        for total in &mut mean {
            *total /= members.len() as f64;
        }
        centroids[cluster] = mean;
    }
}

fn distance_squared(row: &[f64], centroid: &[f64]) -> f64 {
    row.iter()
        .zip(centroid)
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}
