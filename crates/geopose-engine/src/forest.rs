//! The copy-on-write frame forest.
//!
//! The live forest is a single atomic reference to an immutable
//! [`Snapshot`]; readers clone the reference and traverse in complete
//! isolation from concurrent writers. Writers (serialized by the engine)
//! derive a new snapshot from the current one through persistent maps
//! ([`im::HashMap`]), so a commit costs O(affected subtree), not O(forest):
//! untouched frames keep their `Arc<FrameRecord>` identity through
//! structural sharing, while the written frame and every descendant
//! receive fresh records with a bumped generation, so anything caching a
//! frame handle can detect staleness by generation alone.

use std::sync::{Arc, RwLock};

use im::HashMap;

use geopose_types::{Frame, PoseError};

use crate::transform::Transform;

/// One immutable node of a snapshot.
#[derive(Debug)]
pub(crate) struct FrameRecord {
    pub name: String,
    /// `None` only for the forest root (the ECEF body frame).
    pub parent: Option<String>,
    /// `None` encodes the UNKNOWN transform of an ungeolocated subgraph
    /// root; distinct from an identity transform.
    pub transform: Option<Transform>,
    pub generation: u64,
}

impl FrameRecord {
    pub fn to_frame(&self) -> Frame {
        Frame {
            name: self.name.clone(),
            parent: self.parent.clone(),
            pose: self.transform.as_ref().map(Transform::to_pose),
            generation: self.generation,
        }
    }
}

/// An immutable picture of the whole forest.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    root: String,
    frames: HashMap<String, Arc<FrameRecord>>,
    /// Child names per parent, in creation order.
    children: HashMap<String, Vec<String>>,
}

impl Snapshot {
    pub fn new(root: &str) -> Self {
        let mut frames = HashMap::new();
        let mut children = HashMap::new();
        frames.insert(
            root.to_string(),
            Arc::new(FrameRecord {
                name: root.to_string(),
                parent: None,
                transform: None,
                generation: 0,
            }),
        );
        children.insert(root.to_string(), Vec::new());
        Self {
            root: root.to_string(),
            frames,
            children,
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FrameRecord>> {
        self.frames.get(name)
    }

    /// The root-of-subgraph containing `name`: the ancestor whose parent is
    /// the forest root (or the root itself when `name` is the root).
    pub fn find_root(&self, name: &str) -> Option<Arc<FrameRecord>> {
        let mut current = self.frames.get(name)?;
        loop {
            match current.parent.as_deref() {
                None => return Some(current.clone()),
                Some(parent) if parent == self.root => return Some(current.clone()),
                Some(parent) => current = self.parent_record(parent, &current.name),
            }
        }
    }

    /// Composes the child→ancestor map from `from` up to `ancestor`
    /// (exclusive of the ancestor's own transform).
    pub fn transform_to_ancestor(&self, from: &str, ancestor: &str) -> Result<Transform, PoseError> {
        let mut accumulated = Transform::identity();
        let mut current = self
            .frames
            .get(from)
            .ok_or_else(|| PoseError::invalid(format!("frame '{from}' does not exist")))?;
        while current.name != ancestor {
            let step = current
                .transform
                .ok_or_else(|| PoseError::UnknownTransform(current.name.clone()))?;
            accumulated = step.compose(&accumulated);
            let parent = current
                .parent
                .as_deref()
                .unwrap_or_else(|| panic!("'{ancestor}' is not an ancestor of '{from}'"));
            current = self.parent_record(parent, &current.name);
        }
        Ok(accumulated)
    }

    /// The frame→ECEF map, failing with [`PoseError::UnknownTransform`]
    /// when the chain crosses an ungeolocated subgraph root.
    pub fn transform_to_root(&self, name: &str) -> Result<Transform, PoseError> {
        self.transform_to_ancestor(name, &self.root)
    }

    /// The src→dst map, short-circuiting at the least common ancestor so
    /// that two frames of the same subgraph resolve without geolocation.
    pub fn transform_between(&self, src: &str, dst: &str) -> Result<Transform, PoseError> {
        if !self.frames.contains_key(dst) {
            return Err(PoseError::invalid(format!("frame '{dst}' does not exist")));
        }
        let mut src_chain = Vec::new();
        let mut current = self
            .frames
            .get(src)
            .ok_or_else(|| PoseError::invalid(format!("frame '{src}' does not exist")))?;
        loop {
            src_chain.push(current.name.clone());
            match current.parent.as_deref() {
                None => break,
                Some(parent) => current = self.parent_record(parent, &current.name),
            }
        }

        let mut current = self.existing(dst);
        let ancestor = loop {
            if src_chain.iter().any(|name| name == &current.name) {
                break current.name.clone();
            }
            match current.parent.as_deref() {
                None => break current.name.clone(),
                Some(parent) => current = self.parent_record(parent, &current.name),
            }
        };

        let src_up = self.transform_to_ancestor(src, &ancestor)?;
        let dst_up = self.transform_to_ancestor(dst, &ancestor)?;
        Ok(dst_up.inverse().compose(&src_up))
    }

    /// Pre-order traversal of the subtree rooted at `start` (the whole
    /// forest when `start` is the root). Unknown names yield an empty
    /// sequence.
    pub fn traverse(self: &Arc<Self>, start: &str) -> Traversal {
        let stack = if self.frames.contains_key(start) {
            vec![start.to_string()]
        } else {
            Vec::new()
        };
        Traversal {
            snapshot: self.clone(),
            stack,
        }
    }

    /// Derives a snapshot with `name` created under `parent` (or its
    /// transform replaced when it already exists there), returning the new
    /// records of the frame and all its descendants in pre-order.
    pub fn with_upserted(
        &self,
        parent: &str,
        name: &str,
        transform: Option<Transform>,
        generation: u64,
    ) -> Result<(Snapshot, Vec<Arc<FrameRecord>>), PoseError> {
        if name.is_empty() {
            return Err(PoseError::invalid("frame name must not be empty"));
        }
        if name == self.root {
            return Err(PoseError::invalid(format!("'{name}' is the reserved root frame")));
        }
        if !self.frames.contains_key(parent) {
            return Err(PoseError::invalid(format!("parent '{parent}' does not exist")));
        }
        if let Some(existing) = self.frames.get(name) {
            if existing.parent.as_deref() != Some(parent) {
                return Err(PoseError::invalid(format!(
                    "frame '{name}' already exists under a different parent"
                )));
            }
        }

        let mut frames = self.frames.clone();
        let mut children = self.children.clone();
        if !self.frames.contains_key(name) {
            children
                .get_mut(parent)
                .unwrap_or_else(|| panic!("edge table missing parent '{parent}'"))
                .push(name.to_string());
            children.insert(name.to_string(), Vec::new());
        }

        // Re-identify the target and every descendant; descendants keep
        // their own transforms toward their (unchanged) parents.
        let mut affected = Vec::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            let record = if current == name {
                Arc::new(FrameRecord {
                    name: current.clone(),
                    parent: Some(parent.to_string()),
                    transform,
                    generation,
                })
            } else {
                let old = self.existing(&current);
                Arc::new(FrameRecord {
                    name: current.clone(),
                    parent: old.parent.clone(),
                    transform: old.transform,
                    generation,
                })
            };
            frames.insert(current.clone(), record.clone());
            affected.push(record);
            if let Some(kids) = children.get(&current) {
                for kid in kids.iter().rev() {
                    stack.push(kid.clone());
                }
            }
        }

        Ok((
            Snapshot {
                root: self.root.clone(),
                frames,
                children,
            },
            affected,
        ))
    }

    /// Derives a snapshot with `name` removed. `Ok(None)` when the frame
    /// does not exist (removal is a no-op); an error when it is the root
    /// or still has children.
    pub fn with_removed(&self, name: &str) -> Result<Option<Snapshot>, PoseError> {
        if name == self.root {
            return Err(PoseError::invalid("the root frame cannot be removed"));
        }
        let Some(record) = self.frames.get(name) else {
            return Ok(None);
        };
        if self.children.get(name).is_some_and(|kids| !kids.is_empty()) {
            return Err(PoseError::invalid(format!(
                "frame '{name}' still has children"
            )));
        }

        let mut frames = self.frames.clone();
        let mut children = self.children.clone();
        frames.remove(name);
        children.remove(name);
        if let Some(parent) = record.parent.as_deref() {
            if let Some(siblings) = children.get_mut(parent) {
                siblings.retain(|sibling| sibling != name);
            }
        }
        Ok(Some(Snapshot {
            root: self.root.clone(),
            frames,
            children,
        }))
    }

    fn parent_record(&self, parent: &str, child: &str) -> &Arc<FrameRecord> {
        self.frames
            .get(parent)
            .unwrap_or_else(|| panic!("forest invariant: parent '{parent}' of '{child}' exists"))
    }

    fn existing(&self, name: &str) -> &Arc<FrameRecord> {
        self.frames
            .get(name)
            .unwrap_or_else(|| panic!("forest invariant: frame '{name}' exists"))
    }
}

/// A restartable pre-order walk over one captured snapshot. Clones walk
/// the same frozen forest from their current position.
#[derive(Clone)]
pub struct Traversal {
    snapshot: Arc<Snapshot>,
    stack: Vec<String>,
}

impl Iterator for Traversal {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let name = self.stack.pop()?;
        if let Some(kids) = self.snapshot.children.get(&name) {
            for kid in kids.iter().rev() {
                self.stack.push(kid.clone());
            }
        }
        Some(self.snapshot.existing(&name).to_frame())
    }
}

/// The live forest: one atomically replaced snapshot pointer.
#[derive(Debug)]
pub(crate) struct FrameForest {
    current: RwLock<Arc<Snapshot>>,
}

impl FrameForest {
    pub fn new(root: &str) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::new(root))),
        }
    }

    /// Captures the current snapshot. Readers only ever touch the captured
    /// snapshot afterwards, so they are immune to concurrent writes.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Publishes a new snapshot. Callers must hold the engine write lock.
    pub fn install(&self, snapshot: Snapshot) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geopose_types::{NauticalAngles, Pose};
    use nalgebra::Vector3;

    fn offset(x: f64, y: f64, z: f64) -> Option<Transform> {
        Some(Transform::from_pose(&Pose::from_xyz(
            x,
            y,
            z,
            NauticalAngles::IDENTITY,
        )))
    }

    fn forest_with_chain() -> Arc<Snapshot> {
        // ECEF -> a (unknown) -> b (1,2,3) -> c (0,0,5); plus a second
        // child of a.
        let snapshot = Snapshot::new("ECEF");
        let (snapshot, _) = snapshot.with_upserted("ECEF", "a", None, 1).unwrap();
        let (snapshot, _) = snapshot.with_upserted("a", "b", offset(1.0, 2.0, 3.0), 2).unwrap();
        let (snapshot, _) = snapshot.with_upserted("b", "c", offset(0.0, 0.0, 5.0), 3).unwrap();
        let (snapshot, _) = snapshot.with_upserted("a", "d", offset(-1.0, 0.0, 0.0), 4).unwrap();
        Arc::new(snapshot)
    }

    #[test]
    fn traverse_is_preorder_in_creation_order() {
        let snapshot = forest_with_chain();
        let names: Vec<String> = snapshot.traverse("ECEF").map(|f| f.name).collect();
        assert_eq!(names, ["ECEF", "a", "b", "c", "d"]);
    }

    #[test]
    fn traverse_unknown_name_is_empty() {
        let snapshot = forest_with_chain();
        assert_eq!(snapshot.traverse("ghost").count(), 0);
    }

    #[test]
    fn find_root_walks_to_the_subgraph_root() {
        let snapshot = forest_with_chain();
        assert_eq!(snapshot.find_root("c").unwrap().name, "a");
        assert_eq!(snapshot.find_root("a").unwrap().name, "a");
        assert_eq!(snapshot.find_root("ECEF").unwrap().name, "ECEF");
        assert!(snapshot.find_root("ghost").is_none());
    }

    #[test]
    fn transform_between_shares_a_subgraph_without_geolocation() {
        let snapshot = forest_with_chain();
        let map = snapshot.transform_between("c", "d").unwrap();
        // c in a-coordinates: (1,2,8); d origin: (-1,0,0).
        assert_relative_eq!(
            map.translation(),
            Vector3::new(2.0, 2.0, 8.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn transform_to_root_requires_geolocation() {
        let snapshot = forest_with_chain();
        let err = snapshot.transform_to_root("c").unwrap_err();
        assert_eq!(err, PoseError::UnknownTransform("a".to_string()));
    }

    #[test]
    fn upsert_rejects_missing_parent_and_parent_change() {
        let snapshot = forest_with_chain();
        assert!(matches!(
            snapshot.with_upserted("ghost", "x", offset(0.0, 0.0, 0.0), 9),
            Err(PoseError::InvalidArgument(_))
        ));
        assert!(matches!(
            snapshot.with_upserted("b", "d", offset(0.0, 0.0, 0.0), 9),
            Err(PoseError::InvalidArgument(_))
        ));
        assert!(matches!(
            snapshot.with_upserted("a", "ECEF", offset(0.0, 0.0, 0.0), 9),
            Err(PoseError::InvalidArgument(_))
        ));
    }

    #[test]
    fn upsert_bumps_generations_of_the_whole_subtree() {
        let snapshot = forest_with_chain();
        let (next, affected) = snapshot.with_upserted("ECEF", "a", offset(0.0, 0.0, 0.0), 9).unwrap();
        let names: Vec<&str> = affected.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
        assert!(affected.iter().all(|r| r.generation == 9));
        // Descendants keep their own transforms toward their parents.
        let b = next.get("b").unwrap();
        assert_relative_eq!(
            b.transform.unwrap().translation(),
            Vector3::new(1.0, 2.0, 3.0)
        );
        // Frames outside the subtree keep their identity.
        assert!(Arc::ptr_eq(
            next.get("ECEF").unwrap(),
            snapshot.get("ECEF").unwrap()
        ));
    }

    #[test]
    fn remove_validations() {
        let snapshot = forest_with_chain();
        assert!(matches!(
            snapshot.with_removed("a"),
            Err(PoseError::InvalidArgument(_))
        ));
        assert!(matches!(
            snapshot.with_removed("ECEF"),
            Err(PoseError::InvalidArgument(_))
        ));
        assert!(snapshot.with_removed("ghost").unwrap().is_none());
        let next = snapshot.with_removed("c").unwrap().unwrap();
        assert!(next.get("c").is_none());
        assert!(!next.children.get("b").unwrap().contains(&"c".to_string()));
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let forest = FrameForest::new("ECEF");
        let (next, _) = forest
            .snapshot()
            .with_upserted("ECEF", "a", None, 1)
            .unwrap();
        forest.install(next);

        let captured = forest.snapshot();
        let walk = captured.traverse("ECEF");

        let (next, _) = forest
            .snapshot()
            .with_upserted("a", "b", offset(1.0, 0.0, 0.0), 2)
            .unwrap();
        forest.install(next);

        // The walk started before the write still sees the old forest.
        let names: Vec<String> = walk.map(|f| f.name).collect();
        assert_eq!(names, ["ECEF", "a"]);
        assert_eq!(forest.snapshot().len(), 3);
    }
}
