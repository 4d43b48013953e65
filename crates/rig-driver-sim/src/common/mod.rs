//! Common infrastructure for simulated devices.
//!
//! - **mode**: Operational modes (Instant, Realistic)
//! - **timing**: Hardware-like timing configuration
//! - **rng**: Seeded random number generator

pub mod mode;
pub mod rng;
pub mod timing;

pub use mode::SimMode;
pub use rng::SimRng;
pub use timing::TimingConfig;
