//! Interrupt-driven quadrature encoder counter.
//!
//! Channel A is registered as an edge interrupt (both edges, no debounce
//! filter); the callback reads channel B's level at that instant to decide
//! the direction. The counter is an `AtomicI64` shared between the GPIO
//! interrupt callback and the sampling task, and it is never reset for the
//! lifetime of the process.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use rppal::gpio::{Event, Gpio, InputPin, Trigger};
use tracing::info;

use super::SensorError;

/// Signed position counter fed by encoder edges.
pub struct QuadratureCounter {
    count: Arc<AtomicI64>,
    // Keeps the interrupt registration alive for the counter's lifetime.
    _channel_a: InputPin,
}

impl QuadratureCounter {
    /// Claims both encoder channels with pull-ups and registers the edge
    /// interrupt on channel A.
    pub fn new(gpio: &Gpio, pin_a: u8, pin_b: u8) -> Result<Self, SensorError> {
        let mut channel_a = gpio.get(pin_a)?.into_input_pullup();
        let channel_b = gpio.get(pin_b)?.into_input_pullup();
        let count = Arc::new(AtomicI64::new(0));

        let isr_count = count.clone();
        channel_a.set_async_interrupt(Trigger::Both, None, move |_event: Event| {
            apply_edge(&isr_count, channel_b.is_high());
        })?;

        info!(
            "Quadrature encoder initialized on GPIO {} (channel A, interrupt) and GPIO {} (channel B)",
            pin_a, pin_b
        );
        Ok(Self {
            count,
            _channel_a: channel_a,
        })
    }

    /// Current counter value.
    pub fn value(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Applies one edge to the counter: companion channel high counts up,
/// low counts down. Every edge moves the counter by exactly one.
pub(crate) fn apply_edge(count: &AtomicI64, companion_high: bool) {
    if companion_high {
        count.fetch_add(1, Ordering::Relaxed);
    } else {
        count.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn companion_high_counts_up() {
        let count = AtomicI64::new(0);
        apply_edge(&count, true);
        apply_edge(&count, true);
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn companion_low_counts_down() {
        let count = AtomicI64::new(0);
        apply_edge(&count, false);
        assert_eq!(count.load(Ordering::Relaxed), -1);
    }

    #[test]
    fn mixed_edges_accumulate() {
        let count = AtomicI64::new(0);
        for companion_high in [true, true, false, true, false, false, false] {
            apply_edge(&count, companion_high);
        }
        assert_eq!(count.load(Ordering::Relaxed), -1);
    }

    proptest! {
        #[test]
        fn edge_sequence_sums_directions(edges in proptest::collection::vec(any::<bool>(), 0..512)) {
            let count = AtomicI64::new(0);
            for &companion_high in &edges {
                apply_edge(&count, companion_high);
            }
            let ups = edges.iter().filter(|&&high| high).count() as i64;
            let downs = edges.len() as i64 - ups;
            prop_assert_eq!(count.load(Ordering::Relaxed), ups - downs);
        }
    }
}
