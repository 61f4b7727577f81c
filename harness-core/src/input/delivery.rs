use crate::error::DeliveryError;
use crate::input::keys::{KeyDirection, VirtualKey};

/// One way of getting a key event into the target application.
pub trait DeliveryStrategy {
    fn name(&self) -> &'static str;

    fn deliver(&mut self, key: VirtualKey, direction: KeyDirection) -> Result<(), DeliveryError>;
}

/// Ordered fallback list. The first strategy that succeeds ends the chain;
/// every failure is logged and none escapes.
#[derive(Default)]
pub struct DeliveryChain {
    strategies: Vec<Box<dyn DeliveryStrategy>>,
}

impl DeliveryChain {
    pub fn new(strategies: Vec<Box<dyn DeliveryStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn push(&mut self, strategy: Box<dyn DeliveryStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Returns whether any strategy delivered the event.
    pub fn send(&mut self, key: VirtualKey, direction: KeyDirection) -> bool {
        for strategy in &mut self.strategies {
            match strategy.deliver(key, direction) {
                Ok(()) => return true,
                Err(err) => tracing::debug!(
                    strategy = strategy.name(),
                    key = %key,
                    ?direction,
                    "input delivery attempt failed: {err}"
                ),
            }
        }

        tracing::warn!(
            key = %key,
            ?direction,
            strategies = self.strategies.len(),
            "input event dropped: every delivery strategy failed"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    struct Scripted {
        name: &'static str,
        succeed: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl DeliveryStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn deliver(&mut self, _: VirtualKey, _: KeyDirection) -> Result<(), DeliveryError> {
            self.calls.lock().unwrap().push(self.name);
            if self.succeed {
                Ok(())
            } else {
                Err(DeliveryError::Rejected("scripted".to_string()))
            }
        }
    }

    fn chain(plan: &[(&'static str, bool)]) -> (DeliveryChain, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let strategies = plan
            .iter()
            .map(|&(name, succeed)| {
                Box::new(Scripted {
                    name,
                    succeed,
                    calls: calls.clone(),
                }) as Box<dyn DeliveryStrategy>
            })
            .collect();
        (DeliveryChain::new(strategies), calls)
    }

    #[test]
    fn first_success_stops_the_chain() {
        let (mut chain, calls) = chain(&[("post", true), ("synth", true)]);
        assert!(chain.send(VirtualKey::Space, KeyDirection::Press));
        assert_eq!(*calls.lock().unwrap(), vec!["post"]);
    }

    #[test]
    fn falls_back_in_order() {
        let (mut chain, calls) = chain(&[("post", false), ("synth", true)]);
        assert!(chain.send(VirtualKey::Space, KeyDirection::Press));
        assert_eq!(*calls.lock().unwrap(), vec!["post", "synth"]);
    }

    #[test]
    fn exhausted_chain_reports_failure_without_panicking() {
        let (mut chain, calls) = chain(&[("post", false), ("synth", false)]);
        assert!(!chain.send(VirtualKey::Space, KeyDirection::Release));
        assert_eq!(calls.lock().unwrap().len(), 2);

        let mut empty = DeliveryChain::default();
        assert!(!empty.send(VirtualKey::Space, KeyDirection::Press));
    }
}
