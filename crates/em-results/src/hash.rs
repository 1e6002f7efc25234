//! Content-based hashing for run IDs.

use crate::types::BatchSpec;
use sha2::{Digest, Sha256};

pub fn compute_run_id(spec: &BatchSpec, solver_version: &str) -> String {
    let mut hasher = Sha256::new();

    let spec_json = serde_json::to_string(spec).unwrap_or_default();
    hasher.update(spec_json.as_bytes());

    hasher.update(solver_version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConstantsRecord, MappingRecord};

    fn spec(count: usize) -> BatchSpec {
        BatchSpec {
            count,
            t_start: 0.0,
            t_end: 5000.0,
            dt: 0.001,
            solver: "rk4".to_string(),
            bdf: None,
            constants: ConstantsRecord { c1: 0.2, c2: 0.7 },
            mapping: MappingRecord {
                y0_start: 0.0,
                y0_step: 0.1,
                q0: 1.0,
                dy0: 0.0,
                dq0: 0.0,
            },
        }
    }

    #[test]
    fn hash_stability() {
        let hash1 = compute_run_id(&spec(10), "v1");
        let hash2 = compute_run_id(&spec(10), "v1");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        assert_ne!(compute_run_id(&spec(10), "v1"), compute_run_id(&spec(11), "v1"));
        assert_ne!(compute_run_id(&spec(10), "v1"), compute_run_id(&spec(10), "v2"));

        let mut other = spec(10);
        other.solver = "bdf".to_string();
        assert_ne!(compute_run_id(&spec(10), "v1"), compute_run_id(&other, "v1"));
    }

    #[test]
    fn hash_covers_every_initial_component() {
        let base = compute_run_id(&spec(10), "v1");

        let mut other = spec(10);
        other.mapping.dy0 = 0.5;
        assert_ne!(base, compute_run_id(&other, "v1"));

        let mut other = spec(10);
        other.mapping.dq0 = -0.25;
        assert_ne!(base, compute_run_id(&other, "v1"));
    }
}
