#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use stereovo_3d as k3d;

#[doc(inline)]
pub use stereovo_features as features;

#[doc(inline)]
pub use stereovo_odometry as odometry;
