//! Containment relationships between the volumes of a geometry.
//!
//! Detector geometries are trees: the master volume holds daughters, which
//! hold their own daughters, and so on. The navigator descends this tree to
//! find the deepest volume holding a point, so the graph stores both
//! directions of every relationship.

use crate::error::GeomError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_and_daughters() {
        let mut graph = ContainmentGraph::new(4);
        graph.set_parent(1, 0).unwrap();
        graph.set_parent(2, 0).unwrap();
        graph.set_parent(3, 1).unwrap();

        assert_eq!(graph.get_parent(0), None);
        assert_eq!(graph.get_parent(3), Some(1));
        assert_eq!(graph.daughters(0), &[1, 2]);
        assert_eq!(graph.daughters(1), &[3]);
        assert!(graph.daughters(2).is_empty());
        assert_eq!(graph.roots(), vec![0]);
        assert_eq!(graph.ancestors(3).collect::<Vec<_>>(), vec![1, 0]);
        assert!(graph.is_within(3, 0));
        assert!(!graph.is_within(2, 1));
    }

    #[test]
    fn reject_bad_relationships() {
        let mut graph = ContainmentGraph::new(3);
        assert!(graph.set_parent(0, 5).is_err());
        assert!(graph.set_parent(1, 1).is_err());
        graph.set_parent(1, 0).unwrap();
        graph.set_parent(2, 1).unwrap();
        // would close a loop 0 -> 1 -> 2 -> 0
        assert!(graph.set_parent(0, 2).is_err());
        // a volume has a single mother
        assert!(graph.set_parent(2, 0).is_err());
    }
}

/// Parent/daughter relationships between volumes, indexed by volume id.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainmentGraph {
    parent: Vec<Option<usize>>, // Maps each volume to its mother volume
    daughters: Vec<Vec<usize>>, // Maps each volume to the volumes placed inside it
}

impl ContainmentGraph {
    pub fn new(num_volumes: usize) -> Self {
        Self {
            parent: vec![None; num_volumes],
            daughters: vec![Vec::new(); num_volumes],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Places `child` inside `parent`.
    pub fn set_parent(&mut self, child: usize, parent: usize) -> Result<(), GeomError> {
        let len = self.parent.len();
        if child >= len || parent >= len {
            return Err(GeomError::Description(format!(
                "containment {} -> {} is out of range for {} volumes",
                child, parent, len
            )));
        }
        if child == parent {
            return Err(GeomError::Description(format!(
                "volume {} cannot contain itself",
                child
            )));
        }
        if let Some(existing) = self.parent[child] {
            return Err(GeomError::Description(format!(
                "volume {} is already placed in volume {}",
                child, existing
            )));
        }
        if self.is_within(parent, child) {
            return Err(GeomError::Description(format!(
                "placing volume {} in volume {} creates a containment loop",
                child, parent
            )));
        }

        self.parent[child] = Some(parent);
        self.daughters[parent].push(child);
        Ok(())
    }

    pub fn get_parent(&self, volume: usize) -> Option<usize> {
        self.parent[volume]
    }

    pub fn daughters(&self, volume: usize) -> &[usize] {
        &self.daughters[volume]
    }

    /// Volumes without a mother.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.parent.len())
            .filter(|&i| self.parent[i].is_none())
            .collect()
    }

    /// Mother, grandmother, ... of `volume`, innermost first.
    pub fn ancestors(&self, volume: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.parent[volume], move |&v| self.parent[v])
    }

    /// True if `volume` is `ancestor` or lies anywhere below it.
    pub fn is_within(&self, volume: usize, ancestor: usize) -> bool {
        volume == ancestor || self.ancestors(volume).any(|v| v == ancestor)
    }
}
