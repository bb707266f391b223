//! State Generation
//!
//! Anti-forgery `state` values for the authorization request.

use base64::Engine;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Source of `state` values.
pub trait StateGenerator: Send + Sync {
    /// Produce a fresh candidate value.
    fn generate(&self) -> String;

    /// Produce a value not present in `existing`.
    fn generate_unique(&self, existing: &[String]) -> String {
        loop {
            let candidate = self.generate();
            if !existing.iter().any(|id| id == &candidate) {
                return candidate;
            }
        }
    }
}

/// 128 bits from the thread-local CSPRNG, base64url without padding.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomStateGenerator;

impl RandomStateGenerator {
    /// Create new generator.
    pub fn new() -> Self {
        Self
    }
}

impl StateGenerator for RandomStateGenerator {
    fn generate(&self) -> String {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Mock state generator for testing. Hands out queued values, then numbered fallbacks.
#[derive(Default)]
pub struct MockStateGenerator {
    queued: Mutex<VecDeque<String>>,
    generated: Mutex<Vec<String>>,
}

impl MockStateGenerator {
    /// Create new mock generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next value to generate.
    pub fn set_next_state(&self, state: impl Into<String>) -> &Self {
        self.queued.lock().unwrap().push_back(state.into());
        self
    }

    /// Every value generated so far, including rejected collisions.
    pub fn get_generate_history(&self) -> Vec<String> {
        self.generated.lock().unwrap().clone()
    }
}

impl StateGenerator for MockStateGenerator {
    fn generate(&self) -> String {
        let mut generated = self.generated.lock().unwrap();
        let state = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("mock-state-{}", generated.len()));
        generated.push(state.clone());
        state
    }
}

/// Create random state generator.
pub fn create_state_generator() -> RandomStateGenerator {
    RandomStateGenerator::new()
}

/// Create mock state generator for testing.
pub fn create_mock_state_generator() -> MockStateGenerator {
    MockStateGenerator::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_state_shape() {
        let state = RandomStateGenerator::new().generate();
        assert_eq!(state.len(), 22);
        assert!(state
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_random_states_differ() {
        let generator = create_state_generator();
        let states: HashSet<String> = (0..100).map(|_| generator.generate()).collect();
        assert_eq!(states.len(), 100);
    }

    #[test]
    fn test_generate_unique_skips_collisions() {
        let generator = create_mock_state_generator();
        generator
            .set_next_state("taken")
            .set_next_state("also-taken")
            .set_next_state("free");

        let existing = vec!["taken".to_string(), "also-taken".to_string()];
        assert_eq!(generator.generate_unique(&existing), "free");
        assert_eq!(generator.get_generate_history().len(), 3);
    }

    #[test]
    fn test_mock_generator_fallback() {
        let generator = MockStateGenerator::new();
        assert_eq!(generator.generate(), "mock-state-0");
        assert_eq!(generator.generate(), "mock-state-1");
    }
}
