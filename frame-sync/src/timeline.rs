//! Per-slot timeline of named frame phases.
//!
//! Each frame-in-flight slot owns one timeline semaphore. Every use of the slot
//! occupies [`FramePhase::COUNT`] consecutive values, so the value of a phase is
//! `frame_count * COUNT + phase`:
//!
//! ```text
//! frame 0: Pending=0  PreTransfer=1  PreCompute=2  Graphics=3  PostCompute=4  CopyToPresent=5
//! frame 1: Pending=6  PreTransfer=7  ...                                      CopyToPresent=11
//! ```
//!
//! The semaphore starts at 0. [`FrameTimeline::baseline`] is the last value the
//! previous use of the slot signaled (`CopyToPresentFinished` of frame
//! `frame_count - 1`), or 0 for the first use. Work that starts a frame waits on
//! the baseline, which is already reached for every frame including the first,
//! so nothing ever has to be signaled up front.

use crate::access::PipelineStages;
use crate::backend::{GpuSemaphore, SemaphoreSubmit};

/// A named point within one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FramePhase {
    Pending = 0,
    PreTransferFinished = 1,
    PreComputeFinished = 2,
    GraphicsFinished = 3,
    PostComputeFinished = 4,
    CopyToPresentFinished = 5,
}

impl FramePhase {
    /// Number of phases per frame.
    pub const COUNT: u64 = 6;

    /// All phases in order.
    pub const ALL: [FramePhase; 6] = [
        Self::Pending,
        Self::PreTransferFinished,
        Self::PreComputeFinished,
        Self::GraphicsFinished,
        Self::PostComputeFinished,
        Self::CopyToPresentFinished,
    ];

    pub const fn index(self) -> u64 {
        self as u64
    }
}

/// The timeline semaphore of one frame slot and its use counter.
#[derive(Debug)]
pub struct FrameTimeline {
    semaphore: GpuSemaphore,
    frame_count: u64,
}

impl FrameTimeline {
    /// Wrap a timeline semaphore whose current value is 0.
    pub fn new(semaphore: GpuSemaphore) -> Self {
        Self {
            semaphore,
            frame_count: 0,
        }
    }

    /// Absolute value of `phase` for a given use of the slot.
    pub const fn value_at(frame_count: u64, phase: FramePhase) -> u64 {
        frame_count * FramePhase::COUNT + phase.index()
    }

    /// Absolute value of `phase` for the current use of the slot.
    pub fn value(&self, phase: FramePhase) -> u64 {
        Self::value_at(self.frame_count, phase)
    }

    /// The last value signaled by the previous use of this slot, 0 for the first use.
    pub fn baseline(&self) -> u64 {
        (self.frame_count * FramePhase::COUNT).saturating_sub(1)
    }

    /// Number of completed uses of this slot.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Move to the next use of the slot.
    ///
    /// Must be called once per use, after every wait that refers to the current
    /// use has been submitted.
    pub fn advance(&mut self) {
        self.frame_count += 1;
    }

    /// Wait for `phase` of the current use before `stages` run.
    pub fn wait_info(&self, phase: FramePhase, stages: PipelineStages) -> SemaphoreSubmit<'_> {
        SemaphoreSubmit {
            semaphore: &self.semaphore,
            value: self.value(phase),
            stages,
        }
    }

    /// Wait for the previous use of this slot to finish before `stages` run.
    pub fn baseline_wait_info(&self, stages: PipelineStages) -> SemaphoreSubmit<'_> {
        SemaphoreSubmit {
            semaphore: &self.semaphore,
            value: self.baseline(),
            stages,
        }
    }

    /// Signal `phase` of the current use once `stages` complete.
    pub fn signal_info(&self, phase: FramePhase, stages: PipelineStages) -> SemaphoreSubmit<'_> {
        SemaphoreSubmit {
            semaphore: &self.semaphore,
            value: self.value(phase),
            stages,
        }
    }

    pub fn semaphore(&self) -> &GpuSemaphore {
        &self.semaphore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SemaphoreKind;
    use crate::backend::dummy::DummyBackend;

    fn timeline() -> FrameTimeline {
        let semaphore = DummyBackend::new()
            .create_semaphore(SemaphoreKind::Timeline { initial: 0 })
            .unwrap();
        FrameTimeline::new(semaphore)
    }

    #[test]
    fn test_values_strictly_increase_across_frames() {
        for phase in FramePhase::ALL {
            for frame in 0..64 {
                assert!(
                    FrameTimeline::value_at(frame + 1, phase)
                        > FrameTimeline::value_at(frame, phase)
                );
            }
        }
    }

    #[test]
    fn test_values_distinct_within_frame() {
        for frame in [0, 1, 7, 1000] {
            let mut values: Vec<u64> = FramePhase::ALL
                .iter()
                .map(|&p| FrameTimeline::value_at(frame, p))
                .collect();
            values.dedup();
            assert_eq!(values.len(), FramePhase::ALL.len());
            // Every value of this frame lies above every value of the previous one.
            if frame > 0 {
                assert!(
                    values[0]
                        > FrameTimeline::value_at(frame - 1, FramePhase::CopyToPresentFinished)
                );
            }
        }
    }

    #[test]
    fn test_baseline() {
        let mut timeline = timeline();
        assert_eq!(timeline.baseline(), 0);
        timeline.advance();
        assert_eq!(
            timeline.baseline(),
            FrameTimeline::value_at(0, FramePhase::CopyToPresentFinished)
        );
        timeline.advance();
        assert_eq!(timeline.baseline(), 11);
        assert_eq!(timeline.value(FramePhase::PreTransferFinished), 13);
    }

    #[test]
    fn test_wait_and_signal_infos() {
        let mut timeline = timeline();
        timeline.advance();
        let wait = timeline.wait_info(
            FramePhase::PostComputeFinished,
            PipelineStages::ALL_TRANSFER,
        );
        assert_eq!(wait.value, 10);
        assert_eq!(wait.stages, PipelineStages::ALL_TRANSFER);
        let signal = timeline.signal_info(
            FramePhase::CopyToPresentFinished,
            PipelineStages::ALL_COMMANDS,
        );
        assert_eq!(signal.value, 11);
        let baseline = timeline.baseline_wait_info(PipelineStages::ALL_COMMANDS);
        assert_eq!(baseline.value, 5);
    }
}
