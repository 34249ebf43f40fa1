//! Trigger detection for bot replies.
//!
//! A reply is a trigger when it contains a tilde, either full-width `～` or
//! ASCII `~`. Whether a trigger also shows the heart effect is decided by an
//! [`EffectPolicy`] rolled against an injected random source, so the result
//! is reproducible under a seeded RNG.

use crate::Reaction;
use rand::Rng;

/// Characters that mark a reply as a trigger.
pub const TRIGGER_MARKERS: [char; 2] = ['～', '~'];

pub fn contains_marker(text: &str) -> bool {
    text.chars().any(|c| TRIGGER_MARKERS.contains(&c))
}

/// Probability that a triggering reply shows the effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectPolicy {
    probability: f64,
}

impl EffectPolicy {
    pub const ALWAYS: EffectPolicy = EffectPolicy { probability: 1.0 };
    pub const NEVER: EffectPolicy = EffectPolicy { probability: 0.0 };

    /// Values outside `[0, 1]` are clamped; NaN means always.
    pub fn new(probability: f64) -> Self {
        if probability.is_nan() {
            return Self::ALWAYS;
        }
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        if self.probability >= 1.0 {
            true
        } else if self.probability <= 0.0 {
            false
        } else {
            rng.gen_bool(self.probability)
        }
    }
}

impl Default for EffectPolicy {
    fn default() -> Self {
        Self::ALWAYS
    }
}

/// Decide the reaction for `reply`. Pure apart from drawing from `rng`, and
/// only when the reply actually triggers.
pub fn evaluate<R: Rng + ?Sized>(
    reply: &str,
    ended: bool,
    policy: &EffectPolicy,
    rng: &mut R,
) -> Reaction {
    if ended || !contains_marker(reply) {
        return Reaction::default();
    }
    Reaction {
        triggered: true,
        show_effect: policy.roll(rng),
    }
}
