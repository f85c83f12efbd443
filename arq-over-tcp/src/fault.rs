//! Deterministic fault injection for exercising the recovery paths.
//!
//! The underlying stream is reliable, so loss and corruption have to be
//! manufactured.  A [`FaultPlan`] names the sequence numbers to disturb and a
//! [`FaultInjector`] applies it:
//!
//! | Side     | Fault       | Effect on the first occurrence of `seq`          |
//! |----------|-------------|--------------------------------------------------|
//! | sender   | drop        | frame is never written                           |
//! | sender   | corrupt     | bit 0 of the first payload byte is flipped       |
//! | sender   | duplicate   | frame is written twice back to back              |
//! | receiver | drop        | frame is ignored, no reply                       |
//! | receiver | corrupt     | frame is treated as a checksum failure           |
//! | receiver | delay ACK   | reply is sent after a pause                      |
//!
//! Every fault fires **once** per sequence number per connection; later
//! transmissions of the same sequence always pass through untouched.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::codec::DATA_HEADER_LEN;

/// Which sequence numbers to disturb.  Empty by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pub drop: BTreeSet<u16>,
    pub corrupt: BTreeSet<u16>,
    /// Sender side only.
    pub duplicate: BTreeSet<u16>,
    /// Receiver side only.
    pub delay_ack: BTreeMap<u16, Duration>,
}

impl FaultPlan {
    pub fn is_empty(&self) -> bool {
        self.drop.is_empty()
            && self.corrupt.is_empty()
            && self.duplicate.is_empty()
            && self.delay_ack.is_empty()
    }

    /// Reproducible random sender-side plan over sequences `0..count`.
    ///
    /// Each sequence is disturbed with probability `rate`; a disturbed
    /// sequence gets exactly one of drop, corrupt or duplicate.
    pub fn sampled(seed: u64, rate: f64, count: u16) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let rate = rate.clamp(0.0, 1.0);
        let mut plan = Self::default();
        for seq in 0..count {
            if !rng.random_bool(rate) {
                continue;
            }
            match rng.random_range(0..3u8) {
                0 => plan.drop.insert(seq),
                1 => plan.corrupt.insert(seq),
                _ => plan.duplicate.insert(seq),
            };
        }
        plan
    }
}

/// Verdict for an inbound DATA frame on the receiver side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundFault {
    Deliver,
    Drop,
    Corrupt,
}

/// Applies a [`FaultPlan`], remembering which faults have already fired.
#[derive(Debug, Default)]
pub struct FaultInjector {
    plan: FaultPlan,
    sent: HashSet<u16>,
    received: HashSet<u16>,
    delayed: HashSet<u16>,
}

impl FaultInjector {
    pub fn new(plan: FaultPlan) -> Self {
        Self {
            plan,
            ..Self::default()
        }
    }

    /// A pass-through injector.
    pub fn none() -> Self {
        Self::default()
    }

    /// Copies of `frame` to actually write for this transmission of `seq`.
    ///
    /// Returns zero copies (drop), one (faithful or corrupted) or two
    /// (duplicate).  `frame` itself is never modified, so the caller's
    /// retransmission buffer keeps the correct bytes.
    pub fn outbound(&mut self, seq: u16, frame: &[u8]) -> Vec<Vec<u8>> {
        if !self.sent.insert(seq) {
            return vec![frame.to_vec()];
        }

        if self.plan.drop.contains(&seq) {
            log::debug!("[fault] drop seq={seq} (first transmission not sent)");
            return Vec::new();
        }

        let mut wire = frame.to_vec();
        if self.plan.corrupt.contains(&seq) && wire.len() > DATA_HEADER_LEN {
            wire[DATA_HEADER_LEN] ^= 0x01;
            log::debug!("[fault] corrupt seq={seq} (payload bit flipped)");
        }

        if self.plan.duplicate.contains(&seq) {
            log::debug!("[fault] duplicate seq={seq}");
            return vec![wire.clone(), wire];
        }
        vec![wire]
    }

    /// How the receiver should treat this arrival of `seq`.
    pub fn inbound(&mut self, seq: u16) -> InboundFault {
        if !self.received.insert(seq) {
            return InboundFault::Deliver;
        }
        if self.plan.drop.contains(&seq) {
            log::debug!("[fault] receiver drop seq={seq}");
            InboundFault::Drop
        } else if self.plan.corrupt.contains(&seq) {
            log::debug!("[fault] receiver forced corruption seq={seq}");
            InboundFault::Corrupt
        } else {
            InboundFault::Deliver
        }
    }

    /// Pause to insert before the first reply concerning `seq`, if any.
    pub fn ack_delay(&mut self, seq: u16) -> Option<Duration> {
        let delay = *self.plan.delay_ack.get(&seq)?;
        if self.delayed.insert(seq) {
            Some(delay)
        } else {
            None
        }
    }
}
