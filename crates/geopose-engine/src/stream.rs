//! Reactive conversion streams.
//!
//! Each stream emits one result immediately (possibly `None` when the
//! query cannot be answered yet), then re-evaluates whenever a per-frame
//! signal ticks, and completes when the watched frame is removed. Bursts
//! of ticks coalesce: a slow consumer may see fewer emissions, but always
//! eventually sees the result of the latest commit. Dropping a stream
//! releases its per-frame signal subscription immediately.

use geopose_types::{GeodeticPose, Pose};

use crate::engine::PoseEngine;
use crate::signal::SignalSubscription;

/// Live sequence of `pose_to_geodetic(frame, pose)` results.
///
/// Produced by [`PoseEngine::convert_stream`]. The initial value is
/// delivered before any tick-driven value.
pub struct ConvertStream {
    engine: PoseEngine,
    frame: String,
    pose: Pose,
    subscription: SignalSubscription,
    primed: bool,
}

impl ConvertStream {
    pub(crate) fn new(
        engine: PoseEngine,
        frame: String,
        pose: Pose,
        subscription: SignalSubscription,
    ) -> Self {
        Self {
            engine,
            frame,
            pose,
            subscription,
            primed: false,
        }
    }

    /// Waits for the next conversion result.
    ///
    /// `Some(None)` means the query is currently unanswerable (absent
    /// frame or ungeolocated chain); `None` means the stream completed
    /// because the frame was removed.
    pub async fn recv(&mut self) -> Option<Option<GeodeticPose>> {
        if !self.primed {
            self.primed = true;
            return Some(self.engine.pose_to_geodetic(&self.frame, &self.pose));
        }
        match self.subscription.changed().await {
            Ok(()) => Some(self.engine.pose_to_geodetic(&self.frame, &self.pose)),
            Err(_) => None,
        }
    }
}

/// Live sequence of `transform(src, dst, pose)` results.
///
/// Produced by [`PoseEngine::transform_stream`]. A tick on either
/// endpoint's signal triggers re-evaluation; the stream completes as soon
/// as either endpoint is removed (early exit).
pub struct TransformStream {
    engine: PoseEngine,
    src: String,
    dst: String,
    pose: Pose,
    src_subscription: SignalSubscription,
    dst_subscription: SignalSubscription,
    primed: bool,
}

impl TransformStream {
    pub(crate) fn new(
        engine: PoseEngine,
        src: String,
        dst: String,
        pose: Pose,
        src_subscription: SignalSubscription,
        dst_subscription: SignalSubscription,
    ) -> Self {
        Self {
            engine,
            src,
            dst,
            pose,
            src_subscription,
            dst_subscription,
            primed: false,
        }
    }

    /// Waits for the next transform result; same `Some(None)` / `None`
    /// contract as [`ConvertStream::recv`].
    pub async fn recv(&mut self) -> Option<Option<Pose>> {
        if !self.primed {
            self.primed = true;
            return Some(self.engine.transform(&self.src, &self.dst, &self.pose));
        }
        tokio::select! {
            changed = self.src_subscription.changed() => match changed {
                Ok(()) => Some(self.engine.transform(&self.src, &self.dst, &self.pose)),
                Err(_) => None,
            },
            changed = self.dst_subscription.changed() => match changed {
                Ok(()) => Some(self.engine.transform(&self.src, &self.dst, &self.pose)),
                Err(_) => None,
            },
        }
    }
}
