mod custom_pod_autoscaler;

pub use custom_pod_autoscaler::*;
