// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Mapping between cores, clusters and optical hubs.
//!
//! Cores are laid out row-major in a `mesh_width` x `mesh_height` grid with
//! `mesh_height == mesh_width + 1`. The grid is tiled by square clusters of
//! side `S = sqrt(cluster_size)`. Clusters along the bottom edge may be
//! incomplete. Each cluster has a single optical hub hosted by its top-left
//! core.

use std::fmt::Display;

use crate::sim_error;
use crate::types::{ClusterId, CoreId, SimError};

#[derive(Clone, Debug, PartialEq)]
pub struct Topology {
    total_cores: usize,
    cluster_size: usize,
    sqrt_cluster_size: usize,
    mesh_width: usize,
    mesh_height: usize,
    cluster_mesh_width: usize,
    cluster_mesh_height: usize,
}

impl Topology {
    /// Derive the topology of `total_cores` cores grouped into clusters of
    /// `cluster_size` cores.
    ///
    /// Returns an error if the cluster size is not a perfect square or the
    /// core count does not produce a mesh that the clusters tile.
    pub fn new(total_cores: usize, cluster_size: usize) -> Result<Self, SimError> {
        if total_cores == 0 {
            return sim_error!("Total cores must be at least 1");
        }
        if cluster_size == 0 {
            return sim_error!("Cluster size must be at least 1");
        }

        let sqrt_cluster_size = cluster_size.isqrt();
        if sqrt_cluster_size * sqrt_cluster_size != cluster_size {
            return sim_error!(format!(
                "Cluster size({cluster_size}) must be a perfect square"
            ));
        }

        let mesh_width = total_cores.isqrt();
        let mesh_height = total_cores.div_ceil(mesh_width);

        if mesh_width % sqrt_cluster_size != 0 {
            return sim_error!(format!(
                "Mesh width({mesh_width}) must be a multiple of sqrt cluster size({sqrt_cluster_size})"
            ));
        }
        if mesh_height != mesh_width + 1 {
            return sim_error!(format!(
                "Mesh height({mesh_height}) must be one more than mesh width({mesh_width}) for {total_cores} cores"
            ));
        }
        if mesh_width * mesh_height != total_cores {
            return sim_error!(format!(
                "Mesh width({mesh_width}) x height({mesh_height}) must equal total cores({total_cores})"
            ));
        }

        Ok(Self {
            total_cores,
            cluster_size,
            sqrt_cluster_size,
            mesh_width,
            mesh_height,
            cluster_mesh_width: mesh_width / sqrt_cluster_size,
            cluster_mesh_height: mesh_height.div_ceil(sqrt_cluster_size),
        })
    }

    #[must_use]
    pub fn total_cores(&self) -> usize {
        self.total_cores
    }

    #[must_use]
    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    #[must_use]
    pub fn sqrt_cluster_size(&self) -> usize {
        self.sqrt_cluster_size
    }

    #[must_use]
    pub fn mesh_width(&self) -> usize {
        self.mesh_width
    }

    #[must_use]
    pub fn mesh_height(&self) -> usize {
        self.mesh_height
    }

    #[must_use]
    pub fn cluster_mesh_width(&self) -> usize {
        self.cluster_mesh_width
    }

    #[must_use]
    pub fn cluster_mesh_height(&self) -> usize {
        self.cluster_mesh_height
    }

    #[must_use]
    pub fn num_clusters(&self) -> usize {
        self.cluster_mesh_width * self.cluster_mesh_height
    }

    /// Number of clusters that lie entirely in the square part of the mesh.
    #[must_use]
    pub fn num_complete_clusters(&self) -> usize {
        self.cluster_mesh_width * self.cluster_mesh_width
    }

    #[must_use]
    pub fn cluster_of(&self, core_id: CoreId) -> ClusterId {
        let x = core_id % self.mesh_width;
        let y = core_id / self.mesh_width;
        let cluster_x = x / self.sqrt_cluster_size;
        let cluster_y = y / self.sqrt_cluster_size;
        cluster_y * self.cluster_mesh_width + cluster_x
    }

    /// The core hosting the optical hub of a cluster.
    #[must_use]
    pub fn hub_core_of(&self, cluster_id: ClusterId) -> CoreId {
        let cluster_x = cluster_id % self.cluster_mesh_width;
        let cluster_y = cluster_id / self.cluster_mesh_width;
        let x = cluster_x * self.sqrt_cluster_size;
        let y = cluster_y * self.sqrt_cluster_size;
        y * self.mesh_width + x
    }

    #[must_use]
    pub fn is_hub_core(&self, core_id: CoreId) -> bool {
        core_id < self.total_cores && self.hub_core_of(self.cluster_of(core_id)) == core_id
    }

    /// All cores of a cluster in ascending order.
    #[must_use]
    pub fn cores_in_cluster(&self, cluster_id: ClusterId) -> Vec<CoreId> {
        let hub = self.hub_core_of(cluster_id);
        let hub_x = hub % self.mesh_width;
        let hub_y = hub / self.mesh_width;
        let mut cores = Vec::with_capacity(self.cluster_size);
        for y in hub_y..(hub_y + self.sqrt_cluster_size).min(self.mesh_height) {
            for x in hub_x..hub_x + self.sqrt_cluster_size {
                cores.push(y * self.mesh_width + x);
            }
        }
        cores
    }

    /// Cores hosting memory controllers: the hubs of the first
    /// `num_memory_controllers` complete clusters.
    pub fn memory_controller_cores(
        &self,
        num_memory_controllers: usize,
    ) -> Result<Vec<CoreId>, SimError> {
        let num_complete_clusters = self.num_complete_clusters();
        if num_memory_controllers > num_complete_clusters {
            return sim_error!(format!(
                "Number of memory controllers({num_memory_controllers}) exceeds number of complete clusters({num_complete_clusters})"
            ));
        }
        Ok((0..num_memory_controllers)
            .map(|cluster_id| self.hub_core_of(cluster_id))
            .collect())
    }
}

impl Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} cores, {}x{} mesh, {} clusters of {} ({}x{})",
            self.total_cores,
            self.mesh_width,
            self.mesh_height,
            self.num_clusters(),
            self.cluster_size,
            self.cluster_mesh_width,
            self.cluster_mesh_height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: [(usize, usize); 5] = [(20, 4), (72, 4), (72, 16), (12, 1), (110, 25)];

    #[test]
    fn twenty_cores_in_clusters_of_four() {
        let topology = Topology::new(20, 4).unwrap();
        assert_eq!(topology.sqrt_cluster_size(), 2);
        assert_eq!(topology.mesh_width(), 4);
        assert_eq!(topology.mesh_height(), 5);
        assert_eq!(topology.num_clusters(), 6);
        assert_eq!(topology.num_complete_clusters(), 4);

        for core in [0, 1, 4, 5] {
            assert_eq!(topology.cluster_of(core), 0);
        }
        assert_eq!(topology.hub_core_of(0), 0);
        assert_eq!(topology.cluster_of(2), 1);
        assert_eq!(topology.hub_core_of(1), 2);
        assert_eq!(topology.hub_core_of(2), 8);
        assert_eq!(topology.cluster_of(19), 5);
        assert_eq!(topology.hub_core_of(5), 18);

        // The last row of clusters only has one row of cores
        assert_eq!(topology.cores_in_cluster(4), vec![16, 17]);
        assert_eq!(topology.cores_in_cluster(3), vec![10, 11, 14, 15]);
    }

    fn members_by_scan(topology: &Topology, cluster: ClusterId) -> Vec<CoreId> {
        (0..topology.total_cores())
            .filter(|&core| topology.cluster_of(core) == cluster)
            .collect()
    }

    #[test]
    fn hub_is_smallest_core_of_cluster() {
        for (total, size) in VALID {
            let topology = Topology::new(total, size).unwrap();
            for cluster in 0..topology.num_clusters() {
                let hub = topology.hub_core_of(cluster);
                let members = members_by_scan(&topology, cluster);
                assert_eq!(members.iter().min(), Some(&hub), "{total}/{size} cluster {cluster}");
                assert!(topology.is_hub_core(hub));
                for core in members.iter().filter(|&&core| core != hub) {
                    assert!(!topology.is_hub_core(*core));
                }
            }
        }
    }

    #[test]
    fn clusters_partition_cores() {
        for (total, size) in VALID {
            let topology = Topology::new(total, size).unwrap();
            let mut seen = vec![false; total];
            for cluster in 0..topology.num_clusters() {
                let members = members_by_scan(&topology, cluster);
                assert!(!members.is_empty());
                assert_eq!(topology.cores_in_cluster(cluster), members);
                if cluster < topology.num_complete_clusters() {
                    assert_eq!(members.len(), size);
                }
                for core in members {
                    assert!(!seen[core]);
                    seen[core] = true;
                }
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn invalid_topologies() {
        // Not a perfect square
        assert!(Topology::new(20, 3).is_err());
        // Mesh is square rather than width x (width + 1)
        assert!(Topology::new(16, 4).is_err());
        // 4x5 mesh cannot be tiled by 3x3 clusters
        assert!(Topology::new(20, 9).is_err());
        // 21 cores is not 4x5
        assert!(Topology::new(21, 1).is_err());
        assert!(Topology::new(0, 1).is_err());
        assert!(Topology::new(20, 0).is_err());
    }

    #[test]
    fn memory_controllers() {
        let topology = Topology::new(20, 4).unwrap();
        assert_eq!(topology.memory_controller_cores(0).unwrap(), Vec::<CoreId>::new());
        assert_eq!(topology.memory_controller_cores(4).unwrap(), vec![0, 2, 8, 10]);
        assert!(topology.memory_controller_cores(5).is_err());
    }
}
