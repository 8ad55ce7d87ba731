use std::sync::atomic::{AtomicBool, Ordering};

/// Set when saved credentials changed after onboarding; cleared by a restart.
#[derive(Debug, Default)]
pub struct RestartFlag(AtomicBool);

impl RestartFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        if !self.0.swap(true, Ordering::SeqCst) {
            tracing::info!("Gateway restart required");
        }
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_sticky_until_cleared() {
        let flag = RestartFlag::new();
        assert!(!flag.is_set());
        flag.set();
        flag.set();
        assert!(flag.is_set());
        flag.clear();
        assert!(!flag.is_set());
    }
}
