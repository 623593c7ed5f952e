//! Dependency ordering of streams.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use streamtap_types::stream::StreamDescriptor;
use streamtap_types::TapError;

/// Topologically sort `streams` by their parent declarations.
///
/// Returns indices into `streams`. Every stream comes strictly after all of
/// its parents; among streams that are ready at the same time the one
/// declared first wins.
///
/// # Errors
///
/// Returns [`TapError::Configuration`] for an unknown parent or a cycle.
pub fn topo_order(streams: &[StreamDescriptor]) -> Result<Vec<usize>, TapError> {
    let name_to_idx: HashMap<&str, usize> = streams
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; streams.len()];
    // dependents[i] = streams that list stream i as a parent
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); streams.len()];

    for (i, stream) in streams.iter().enumerate() {
        for parent in &stream.parent_streams {
            let Some(&parent_idx) = name_to_idx.get(parent.as_str()) else {
                return Err(TapError::config(format!(
                    "stream '{}' depends on unknown stream '{parent}'",
                    stream.name
                )));
            };
            in_degree[i] += 1;
            dependents[parent_idx].push(i);
        }
    }

    // Kahn's algorithm with a min-heap so ties resolve by declaration order.
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(streams.len());
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &dep in &dependents[idx] {
            in_degree[dep] -= 1;
            if in_degree[dep] == 0 {
                ready.push(Reverse(dep));
            }
        }
    }

    if order.len() < streams.len() {
        let mut cyclic: Vec<&str> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &deg)| deg > 0)
            .map(|(i, _)| streams[i].name.as_str())
            .collect();
        cyclic.sort_unstable();
        return Err(TapError::config(format!(
            "circular stream dependency among: {}",
            cyclic.join(", ")
        )));
    }

    Ok(order)
}
