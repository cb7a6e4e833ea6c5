//! Resolve one stable "world" pose per frame from whichever markers are visible.
//!
//! The first marker ever observed becomes the canonical marker: the reconstruction volume
//! lives in its frame. Whenever another marker is seen together with a resolved canonical
//! pose, the transform between the two is remembered, so that later frames where the
//! canonical marker is occluded can still be placed through the other markers.

use std::collections::HashMap;

use glam::DVec3;
use voxcarve_3d::{pose::Pose, transforms::compose_axis_angle};

use crate::observation::{MarkerId, MarkerObservation};

/// The canonical marker pose resolved for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalPose {
    /// Pose of the canonical marker in the camera frame.
    pub pose: Pose,
    /// Whether the canonical marker was observed directly rather than inferred.
    pub reliable: bool,
}

/// Multi-marker pose fusion state.
#[derive(Debug, Clone, Default)]
pub struct PoseFusion {
    canonical: Option<MarkerId>,
    relative: HashMap<MarkerId, Pose>,
}

impl PoseFusion {
    /// Create an uninitialized fusion state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical marker, once one has been observed.
    pub fn canonical_id(&self) -> Option<MarkerId> {
        self.canonical
    }

    /// The stored transform from `id` to the canonical marker.
    pub fn relative(&self, id: MarkerId) -> Option<&Pose> {
        self.relative.get(&id)
    }

    /// Number of markers with a known relation, the canonical one included.
    pub fn num_markers(&self) -> usize {
        self.relative.len()
    }

    /// Whether a canonical marker has been chosen.
    pub fn is_tracking(&self) -> bool {
        self.canonical.is_some()
    }

    /// Fuse the observations of one frame.
    ///
    /// Returns `None` when there are no observations or when none of the visible markers
    /// is related to the canonical one. The caller skips the frame in that case.
    pub fn update(&mut self, observations: &[MarkerObservation]) -> Option<CanonicalPose> {
        let first = observations.first()?;

        let canonical = match self.canonical {
            Some(id) => id,
            None => {
                log::info!("marker {} becomes the canonical marker", first.id);
                self.canonical = Some(first.id);
                self.relative.insert(first.id, Pose::IDENTITY);
                first.id
            }
        };

        let resolved = match observations.iter().find(|obs| obs.id == canonical) {
            Some(obs) => CanonicalPose {
                pose: obs.pose(),
                reliable: true,
            },
            None => CanonicalPose {
                pose: self.infer(observations)?,
                reliable: false,
            },
        };

        self.learn(canonical, &resolved, observations);

        Some(resolved)
    }

    // average of the canonical poses predicted by every related marker
    fn infer(&self, observations: &[MarkerObservation]) -> Option<Pose> {
        let (count, translation, rotation) = observations
            .iter()
            .filter_map(|obs| self.relative.get(&obs.id).map(|rel| (obs, rel)))
            .fold((0usize, DVec3::ZERO, DVec3::ZERO), |(n, t, r), (obs, rel)| {
                (
                    n + 1,
                    t + obs.translation + rel.translation,
                    r + compose_axis_angle(obs.rotation, rel.rotation),
                )
            });

        if count == 0 {
            log::debug!(
                "none of {} observed markers is linked to the canonical marker",
                observations.len()
            );
            return None;
        }

        let n = count as f64;
        Some(Pose::new(translation / n, rotation / n))
    }

    fn learn(
        &mut self,
        canonical: MarkerId,
        resolved: &CanonicalPose,
        observations: &[MarkerObservation],
    ) {
        for obs in observations.iter().filter(|obs| obs.id != canonical) {
            let relative = Pose::new(
                resolved.pose.translation - obs.translation,
                compose_axis_angle(-obs.rotation, resolved.pose.rotation),
            );
            if resolved.reliable {
                self.relative.insert(obs.id, relative);
            } else {
                self.relative.entry(obs.id).or_insert(relative);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn obs(id: MarkerId, t: [f64; 3], r: [f64; 3]) -> MarkerObservation {
        MarkerObservation::new(id, DVec3::from_array(t), DVec3::from_array(r))
    }

    #[test]
    fn test_no_observations() {
        let mut fusion = PoseFusion::new();
        assert_eq!(fusion.update(&[]), None);
        assert!(!fusion.is_tracking());
    }

    #[test]
    fn test_single_marker() {
        let mut fusion = PoseFusion::new();
        let a = obs(3, [0.1, -0.2, 0.5], [0.0, 0.3, 0.0]);

        let resolved = fusion.update(&[a]);
        assert_eq!(
            resolved,
            Some(CanonicalPose {
                pose: a.pose(),
                reliable: true
            })
        );
        assert_eq!(fusion.canonical_id(), Some(3));
        assert_eq!(fusion.relative(3), Some(&Pose::IDENTITY));
    }

    #[test]
    fn test_canonical_is_fixed_after_first_observation() {
        let mut fusion = PoseFusion::new();
        fusion.update(&[obs(1, [0.0, 0.0, 0.5], [0.0; 3])]);
        fusion.update(&[obs(2, [0.0, 0.0, 0.5], [0.0; 3]), obs(1, [0.0, 0.0, 0.4], [0.0; 3])]);
        assert_eq!(fusion.canonical_id(), Some(1));
    }

    #[test]
    fn test_unlinked_marker_gives_no_pose() {
        let mut fusion = PoseFusion::new();
        assert!(fusion.update(&[obs(1, [0.0, 0.0, 0.5], [0.0; 3])]).is_some());

        // marker 2 was never seen together with marker 1
        assert_eq!(fusion.update(&[obs(2, [0.1, 0.0, 0.5], [0.0; 3])]), None);
        assert_eq!(fusion.relative(2), None);
        assert_eq!(fusion.num_markers(), 1);
    }

    #[test]
    fn test_cooccurrence_then_substitution() {
        let mut fusion = PoseFusion::new();
        let a = obs(1, [0.05, 0.0, 0.6], [0.0, 0.0, 0.4]);
        let b = obs(2, [-0.05, 0.02, 0.55], [0.1, -0.2, 0.3]);

        let resolved = fusion.update(&[a, b]).map(|p| p.reliable);
        assert_eq!(resolved, Some(true));
        let stored = *fusion.relative(2).expect("relation learned");
        assert_relative_eq!(stored.translation.x, 0.1, epsilon = 1e-12);

        // only marker 2 visible, at the same place: the canonical pose is recovered
        let resolved = fusion.update(&[b]).expect("inferred through marker 2");
        assert!(!resolved.reliable);
        assert_relative_eq!(
            resolved.pose.translation.distance(a.translation),
            0.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            resolved.pose.rotation.distance(a.rotation),
            0.0,
            epsilon = 1e-9
        );

        // an unreliable frame never overwrites a stored relation
        let moved = obs(2, [0.3, 0.3, 0.9], [0.5, 0.5, 0.5]);
        let resolved = fusion.update(&[moved]).expect("inferred through marker 2");
        assert!(!resolved.reliable);
        assert_eq!(fusion.relative(2), Some(&stored));
    }

    #[test]
    fn test_unreliable_frame_links_new_markers() {
        let mut fusion = PoseFusion::new();
        let a = obs(1, [0.0, 0.0, 0.5], [0.0; 3]);
        let b = obs(2, [0.1, 0.0, 0.5], [0.0; 3]);
        let c = obs(3, [0.2, 0.0, 0.5], [0.0; 3]);
        fusion.update(&[a, b]);

        // marker 3 is linked through the inferred pose
        let resolved = fusion.update(&[b, c]).expect("inferred through marker 2");
        assert!(!resolved.reliable);
        let rel = fusion.relative(3).expect("relation learned");
        assert_relative_eq!(rel.translation.x, -0.2, epsilon = 1e-12);

        let resolved = fusion.update(&[c]).expect("inferred through marker 3");
        assert_relative_eq!(resolved.pose.translation.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_candidates_are_averaged() {
        let mut fusion = PoseFusion::new();
        fusion.update(&[
            obs(1, [0.0, 0.0, 0.5], [0.0; 3]),
            obs(2, [0.1, 0.0, 0.5], [0.0; 3]),
            obs(3, [-0.1, 0.0, 0.5], [0.0; 3]),
        ]);

        // the two markers disagree by 2cm on where the canonical marker is
        let resolved = fusion
            .update(&[
                obs(2, [0.11, 0.0, 0.5], [0.0; 3]),
                obs(3, [-0.09, 0.0, 0.5], [0.0; 3]),
            ])
            .expect("inferred");
        assert_relative_eq!(resolved.pose.translation.x, 0.01, epsilon = 1e-12);
        assert_relative_eq!(resolved.pose.translation.z, 0.5, epsilon = 1e-12);
    }
}
