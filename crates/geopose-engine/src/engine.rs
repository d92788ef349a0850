//! The `PoseEngine` facade.
//!
//! One engine owns the frame forest, the change bus, the per-frame signal
//! registry, and the Earth model collaborators. Clone it cheaply; all
//! clones share the same engine. Readers never block behind writers:
//! every query runs on a captured snapshot. Writers are serialized by a
//! single engine-wide lock, which also covers change publication so that
//! replay-seeded subscribers can never lose or double-observe a commit.

use std::sync::{Arc, Mutex, MutexGuard};

use geopose_earth::{ConstantGeoid, Ellipsoid, Geoid, ReferenceEllipsoid};
use geopose_types::{Change, Frame, GeodeticPose, Pose, PoseError};

use crate::bus::{ChangeBus, ChangeStream};
use crate::forest::{FrameForest, FrameRecord, Traversal};
use crate::kinematics;
use crate::signal::SignalRegistry;
use crate::stream::{ConvertStream, TransformStream};
use crate::transform::Transform;

/// Facade over the live frame forest. Cheap to clone.
#[derive(Clone)]
pub struct PoseEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    ellipsoid: Arc<dyn Ellipsoid>,
    geoid: Arc<dyn Geoid>,
    forest: FrameForest,
    bus: ChangeBus,
    signals: SignalRegistry,
    /// Writer serialization plus the monotonically increasing commit
    /// sequence stamped onto rewritten frame records.
    write: Mutex<u64>,
}

impl PoseEngine {
    /// Creates an engine over explicit Earth model collaborators. The
    /// forest root takes the ellipsoid's body frame name.
    pub fn new(ellipsoid: Arc<dyn Ellipsoid>, geoid: Arc<dyn Geoid>) -> Self {
        let forest = FrameForest::new(ellipsoid.body_frame());
        Self {
            inner: Arc::new(EngineInner {
                ellipsoid,
                geoid,
                forest,
                bus: ChangeBus::default(),
                signals: SignalRegistry::default(),
                write: Mutex::new(0),
            }),
        }
    }

    /// Engine over WGS-84 with a zero geoid.
    pub fn wgs84() -> Self {
        Self::new(
            Arc::new(ReferenceEllipsoid::WGS84),
            Arc::new(ConstantGeoid::default()),
        )
    }

    pub fn ellipsoid(&self) -> &dyn Ellipsoid {
        &*self.inner.ellipsoid
    }

    pub fn geoid(&self) -> &dyn Geoid {
        &*self.inner.geoid
    }

    /// Name of the reserved root frame.
    pub fn root_name(&self) -> String {
        self.inner.forest.snapshot().root_name().to_string()
    }

    // ── Mutations ───────────────────────────────────────────────────────

    /// Creates `name` as a direct child of the root with an UNKNOWN
    /// transform, making it the root of a new subgraph awaiting
    /// geolocation. Re-issuing for an existing direct child of the root
    /// is a no-op.
    pub fn create_root(&self, name: &str) -> Result<(), PoseError> {
        let mut sequence = self.lock_writer();
        let snapshot = self.inner.forest.snapshot();
        let root = snapshot.root_name().to_string();
        if name == root {
            return Err(PoseError::invalid(format!(
                "'{name}' is the reserved root frame"
            )));
        }
        if let Some(existing) = snapshot.get(name) {
            if existing.parent.as_deref() == Some(root.as_str()) {
                return Ok(());
            }
            return Err(PoseError::invalid(format!(
                "frame '{name}' already exists under a different parent"
            )));
        }
        *sequence += 1;
        let (next, affected) = snapshot.with_upserted(&root, name, None, *sequence)?;
        self.inner.forest.install(next);
        self.publish_created(&affected, *sequence);
        tracing::debug!(frame = name, sequence = *sequence, "created subgraph root");
        Ok(())
    }

    /// Creates `name` under `parent` with the given rigid offset, or
    /// replaces the transform when the frame already exists under the same
    /// parent. Emits one `Created` for the frame and each existing
    /// descendant.
    pub fn create(&self, parent: &str, name: &str, offset: &Pose) -> Result<(), PoseError> {
        let mut sequence = self.lock_writer();
        let snapshot = self.inner.forest.snapshot();
        *sequence += 1;
        let (next, affected) =
            snapshot.with_upserted(parent, name, Some(Transform::from_pose(offset)), *sequence)?;
        self.inner.forest.install(next);
        self.publish_created(&affected, *sequence);
        tracing::debug!(frame = name, parent, sequence = *sequence, "created frame");
        Ok(())
    }

    /// Removes a childless frame. Removing a non-existent name is a no-op.
    pub fn remove(&self, name: &str) -> Result<(), PoseError> {
        let mut sequence = self.lock_writer();
        let snapshot = self.inner.forest.snapshot();
        let Some(next) = snapshot.with_removed(name)? else {
            return Ok(());
        };
        *sequence += 1;
        self.inner.forest.install(next);
        self.inner.bus.publish(Change::Removed {
            name: name.to_string(),
        });
        self.inner.signals.complete(name);
        tracing::debug!(frame = name, sequence = *sequence, "removed frame");
        Ok(())
    }

    /// Rewrites the subgraph containing `name` so that `name` lands at
    /// `geopose`, without deforming the subgraph: every frame keeps its
    /// pose relative to its parent, and only the subgraph root's transform
    /// toward ECEF is replaced.
    pub fn update(&self, name: &str, geopose: &GeodeticPose) -> Result<(), PoseError> {
        let mut sequence = self.lock_writer();
        let snapshot = self.inner.forest.snapshot();
        let record = snapshot
            .get(name)
            .ok_or_else(|| PoseError::invalid(format!("frame '{name}' does not exist")))?
            .clone();
        if record.parent.is_none() {
            return Err(PoseError::invalid("the root frame cannot be geolocated"));
        }
        let root = snapshot.root_name().to_string();
        let placed = kinematics::geodetic_transform(&*self.inner.ellipsoid, geopose);
        let (subject, transform) = if record.parent.as_deref() == Some(root.as_str()) {
            (record.name.clone(), placed)
        } else {
            let subgraph_root = snapshot
                .find_root(name)
                .unwrap_or_else(|| panic!("forest invariant: '{name}' has a subgraph root"));
            let to_subgraph_root = snapshot.transform_to_ancestor(name, &subgraph_root.name)?;
            (
                subgraph_root.name.clone(),
                placed.compose(&to_subgraph_root.inverse()),
            )
        };
        *sequence += 1;
        let (next, affected) = snapshot.with_upserted(&root, &subject, Some(transform), *sequence)?;
        self.inner.forest.install(next);
        self.publish_created(&affected, *sequence);
        tracing::debug!(
            frame = name,
            subgraph_root = %subject,
            sequence = *sequence,
            "geolocated subgraph"
        );
        Ok(())
    }

    // ── Snapshot queries ────────────────────────────────────────────────

    /// The current record of `name`, if it exists.
    pub fn get(&self, name: &str) -> Option<Frame> {
        self.inner
            .forest
            .snapshot()
            .get(name)
            .map(|record| record.to_frame())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.forest.snapshot().get(name).is_some()
    }

    /// Number of live frames, including the root.
    pub fn len(&self) -> usize {
        self.inner.forest.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        // The root is always present.
        self.len() <= 1
    }

    /// Pre-order walk of the whole forest on a captured snapshot.
    pub fn traverse(&self) -> Traversal {
        let snapshot = self.inner.forest.snapshot();
        let root = snapshot.root_name().to_string();
        snapshot.traverse(&root)
    }

    /// Pre-order walk of the subtree rooted at `name`; empty for unknown
    /// names.
    pub fn traverse_from(&self, name: &str) -> Traversal {
        self.inner.forest.snapshot().traverse(name)
    }

    /// The root-of-subgraph containing `name`.
    pub fn find_root(&self, name: &str) -> Option<Frame> {
        self.inner
            .forest
            .snapshot()
            .find_root(name)
            .map(|record| record.to_frame())
    }

    /// Pre-order walk of the whole subgraph containing `name`; empty for
    /// unknown names.
    pub fn subgraph(&self, name: &str) -> Traversal {
        let snapshot = self.inner.forest.snapshot();
        match snapshot.find_root(name) {
            Some(record) => snapshot.traverse(&record.name),
            None => snapshot.traverse(name),
        }
    }

    // ── Conversions ─────────────────────────────────────────────────────

    /// Geodetic placement of `pose` given in frame `name`. `None` when the
    /// frame is absent, its chain to ECEF crosses an ungeolocated subgraph
    /// root, or the result is geodetically degenerate.
    pub fn pose_to_geodetic(&self, name: &str, pose: &Pose) -> Option<GeodeticPose> {
        let snapshot = self.inner.forest.snapshot();
        let to_ecef = snapshot.transform_to_root(name).ok()?;
        kinematics::transform_to_geodetic(
            &*self.inner.ellipsoid,
            &to_ecef.compose(&Transform::from_pose(pose)),
        )
    }

    /// Pose in frame `name` of the geodetic placement `geopose`. Same
    /// absence conditions as [`PoseEngine::pose_to_geodetic`].
    pub fn geodetic_to_pose(&self, name: &str, geopose: &GeodeticPose) -> Option<Pose> {
        let snapshot = self.inner.forest.snapshot();
        let to_ecef = snapshot.transform_to_root(name).ok()?;
        let placed = kinematics::geodetic_transform(&*self.inner.ellipsoid, geopose);
        Some(to_ecef.inverse().compose(&placed).to_pose())
    }

    /// Re-expresses `pose` from frame `src` in frame `dst`. Resolves
    /// within a subgraph without geolocation; across subgraphs both roots
    /// must be geolocated. `None` when an endpoint is absent or the chain
    /// is unresolvable.
    pub fn transform(&self, src: &str, dst: &str, pose: &Pose) -> Option<Pose> {
        let snapshot = self.inner.forest.snapshot();
        let map = snapshot.transform_between(src, dst).ok()?;
        Some(map.transform_pose(pose))
    }

    // ── Streams ─────────────────────────────────────────────────────────

    /// Replay-seeded change stream: one `Created` per live frame in
    /// pre-order, then live changes in commit order.
    pub fn change_stream(&self) -> ChangeStream {
        let _writer = self.lock_writer();
        let snapshot = self.inner.forest.snapshot();
        let root = snapshot.root_name().to_string();
        let seed: Vec<Change> = snapshot.traverse(&root).map(Change::Created).collect();
        self.inner.bus.subscribe_seeded(seed)
    }

    /// Live sequence of `pose_to_geodetic(frame, pose)`; see
    /// [`ConvertStream`].
    pub fn convert_stream(&self, frame: &str, pose: Pose) -> ConvertStream {
        let subscription = self.inner.signals.subscribe(frame);
        ConvertStream::new(self.clone(), frame.to_string(), pose, subscription)
    }

    /// Live sequence of `transform(src, dst, pose)`; see
    /// [`TransformStream`].
    pub fn transform_stream(&self, src: &str, dst: &str, pose: Pose) -> TransformStream {
        let src_subscription = self.inner.signals.subscribe(src);
        let dst_subscription = self.inner.signals.subscribe(dst);
        TransformStream::new(
            self.clone(),
            src.to_string(),
            dst.to_string(),
            pose,
            src_subscription,
            dst_subscription,
        )
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn publish_created(&self, affected: &[Arc<FrameRecord>], sequence: u64) {
        for record in affected {
            self.inner.bus.publish(Change::Created(record.to_frame()));
        }
        self.inner
            .signals
            .notify(affected.iter().map(|record| record.name.as_str()), sequence);
    }

    fn lock_writer(&self) -> MutexGuard<'_, u64> {
        self.inner
            .write
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
