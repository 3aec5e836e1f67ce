pub mod identity;

pub use identity::{greedy_assign, pose_distance, IdentityTracker, TrackState};
