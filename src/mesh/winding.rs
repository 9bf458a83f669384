//! Normal consistency pass.

use super::{Mesh, edge_key};
use std::collections::VecDeque;
use tracing::debug;

impl Mesh {
    /// Make every face winding agree with its neighbours and point outward.
    ///
    /// Each connected component is walked breadth-first from its lowest-index face.
    /// A neighbour that traverses a shared edge in the same direction as the current
    /// face is flipped. Afterwards a component whose signed volume is negative is
    /// flipped wholesale. Returns the number of faces whose winding changed.
    pub fn orient_consistently(&mut self) -> usize {
        let edge_faces = self.edge_face_map();
        let mut component = vec![usize::MAX; self.faces.len()];
        let mut flipped = vec![false; self.faces.len()];
        let mut components: Vec<Vec<usize>> = Vec::new();
        let mut queue = VecDeque::new();

        for seed in 0..self.faces.len() {
            if component[seed] != usize::MAX {
                continue;
            }
            let id = components.len();
            let mut members = vec![seed];
            component[seed] = id;
            queue.push_back(seed);

            while let Some(current) = queue.pop_front() {
                let boundary: Vec<(u32, u32)> = self.faces[current].edges().collect();
                for (a, b) in boundary {
                    let Some(neighbors) = edge_faces.get(&edge_key(a, b)) else {
                        continue;
                    };
                    for &neighbor in neighbors {
                        if neighbor == current || component[neighbor] != usize::MAX {
                            continue;
                        }
                        if self.faces[neighbor].edge_direction(a, b) == Some(true) {
                            self.faces[neighbor].flip();
                            flipped[neighbor] = !flipped[neighbor];
                        }
                        component[neighbor] = id;
                        members.push(neighbor);
                        queue.push_back(neighbor);
                    }
                }
            }
            components.push(members);
        }

        for members in &components {
            if self.signed_volume_of(members.iter().copied()) < 0.0 {
                for &face in members {
                    self.faces[face].flip();
                    flipped[face] = !flipped[face];
                }
            }
        }

        let changed = flipped.iter().filter(|&&f| f).count();
        debug!(components = components.len(), changed, "orientation pass");
        changed
    }
}
