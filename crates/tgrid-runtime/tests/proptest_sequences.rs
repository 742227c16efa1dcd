//! Property-based invariants for sequence builders and the scroll decider.
//!
//! 1. Fade-in is strictly increasing and ends at exactly 1.0.
//! 2. Color transitions end exactly on the target color.
//! 3. Flashes end on the high value.
//! 4. The decider only ever scrolls in the direction of the two samples
//!    that confirmed it, and never on a zero sample.

use proptest::prelude::*;
use tgrid_runtime::{Rgba, ScrollDecider, Sequence, VisualValue, scroll_direction};
use web_time::Duration;

const MS: Duration = Duration::from_millis(1);

fn arb_rgba() -> impl Strategy<Value = Rgba> {
    (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b, a)| Rgba::new(r, g, b, a))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn fade_in_is_monotonic(steps in 1u32..64) {
        let seq = Sequence::fade_in(steps, MS);
        prop_assert_eq!(seq.len(), steps as usize);
        let mut last = 0.0f32;
        for step in seq.steps() {
            let VisualValue::Alpha(alpha) = step.value else {
                return Err(TestCaseError::fail("fade-in produced a color"));
            };
            prop_assert!(alpha > last);
            last = alpha;
        }
        prop_assert_eq!(last, 1.0);
    }

    #[test]
    fn color_transition_lands_on_target(from in arb_rgba(), to in arb_rgba(), steps in 1u32..32) {
        let seq = Sequence::color_transition(from, to, steps, MS);
        prop_assert_eq!(seq.final_value(), Some(VisualValue::Color(to)));
        for step in seq.steps() {
            let VisualValue::Color(c) = step.value else {
                return Err(TestCaseError::fail("transition produced an alpha"));
            };
            prop_assert!(c.r >= from.r.min(to.r) && c.r <= from.r.max(to.r));
            prop_assert!(c.a >= from.a.min(to.a) && c.a <= from.a.max(to.a));
        }
    }

    #[test]
    fn flash_ends_high(repeats in 1u32..10, high in 0.5f32..1.0, low in 0.0f32..0.5) {
        let seq = Sequence::flash(repeats, high, low, MS);
        prop_assert_eq!(seq.len(), 2 * repeats as usize);
        prop_assert_eq!(seq.final_value(), Some(VisualValue::Alpha(high)));
    }

    #[test]
    fn decider_follows_confirmed_direction(samples in prop::collection::vec(-1i8..=1, 0..64)) {
        let mut decider = ScrollDecider::default();
        let mut previous = 0i8;
        for &sample in &samples {
            let decision = decider.observe(sample);
            if sample != 0 && sample == previous {
                prop_assert_eq!(decision, Some(sample));
            } else {
                prop_assert_eq!(decision, None);
            }
            previous = sample;
        }
    }

    #[test]
    fn direction_is_zero_inside_the_band(origin in -500.0f32..500.0, threshold in 0.0f32..100.0, delta in -1.0f32..1.0) {
        let target = origin + delta * threshold;
        prop_assert_eq!(scroll_direction(target, origin, threshold), 0);
        prop_assert_eq!(scroll_direction(origin + threshold + 1.0, origin, threshold), 1);
        prop_assert_eq!(scroll_direction(origin - threshold - 1.0, origin, threshold), -1);
    }
}
