pub mod gate;
pub mod keypoint;
pub mod orientation;
pub mod skeleton;

pub use gate::FrameGate;
pub use keypoint::{Keypoint, Pose, RawDetection, INVALID};
pub use orientation::{Facing, OrientationNormalizer};
pub use skeleton::{FootLandmarks, Joint, PoseModel, Side, Skeleton};
