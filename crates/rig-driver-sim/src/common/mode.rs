//! Operational modes for simulated devices.
//!
//! - **Instant**: Zero delays for unit tests
//! - **Realistic**: Hardware-like timing from [`TimingConfig`](super::TimingConfig)

/// Operational modes for simulated devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimMode {
    /// Zero delays - for unit tests
    Instant,
    /// Hardware-like timing - for running the rig
    #[default]
    Realistic,
}

impl SimMode {
    /// Whether simulated delays should actually be slept.
    pub fn sleeps(&self) -> bool {
        matches!(self, SimMode::Realistic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_realistic() {
        assert_eq!(SimMode::default(), SimMode::Realistic);
        assert!(SimMode::default().sleeps());
    }

    #[test]
    fn test_instant_mode_never_sleeps() {
        assert!(!SimMode::Instant.sleeps());
    }
}
