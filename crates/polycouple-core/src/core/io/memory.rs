use super::traits::TrajectorySource;
use crate::core::models::frame::Frame;
use crate::core::models::topology::Topology;
use std::collections::VecDeque;
use std::convert::Infallible;

/// A trajectory held entirely in memory, for synthetic systems and tests.
#[derive(Debug, Clone)]
pub struct InMemoryTrajectory {
    topology: Topology,
    frames: VecDeque<Frame>,
}

impl InMemoryTrajectory {
    pub fn new(topology: Topology, frames: Vec<Frame>) -> Self {
        Self {
            topology,
            frames: frames.into(),
        }
    }
}

impl TrajectorySource for InMemoryTrajectory {
    type Error = Infallible;

    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn next_frame(&mut self) -> Option<Result<Frame, Self::Error>> {
        self.frames.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::topology::TopologyBuilder;
    use nalgebra::Point3;

    #[test]
    fn frames_are_yielded_in_order_then_exhausted() {
        let mut builder = TopologyBuilder::new();
        builder.add_atom(1, "PTMA", "C1", None);
        let frames = vec![
            Frame::new(0, 0.0, vec![Point3::origin()], None),
            Frame::new(1, 10.0, vec![Point3::origin()], None),
        ];
        let mut trajectory = InMemoryTrajectory::new(builder.build(), frames);

        assert_eq!(trajectory.topology().atom_count(), 1);
        assert_eq!(trajectory.next_frame().unwrap().unwrap().time, 0.0);
        assert_eq!(trajectory.next_frame().unwrap().unwrap().time, 10.0);
        assert!(trajectory.next_frame().is_none());
    }
}
