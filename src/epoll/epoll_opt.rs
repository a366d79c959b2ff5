use std::ops;

/// Registration options: edge- vs. level-triggered, and one-shot.
///
/// The selector always registers level-triggered (the default Kafka-style
/// semantics this crate targets are readiness-based, not edge-triggered;
/// edge triggering is left available for callers of the lower-level
/// `epoll` module directly).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EpollOpt(usize);

const EDGE: usize = 0b001;
const LEVEL: usize = 0b010;
const ONESHOT: usize = 0b100;

impl EpollOpt {
    pub fn edge() -> EpollOpt {
        EpollOpt(EDGE)
    }

    pub fn level() -> EpollOpt {
        EpollOpt(LEVEL)
    }

    pub fn oneshot() -> EpollOpt {
        EpollOpt(ONESHOT)
    }

    pub fn is_edge(&self) -> bool {
        self.0 & EDGE != 0
    }

    pub fn is_level(&self) -> bool {
        self.0 & LEVEL != 0
    }

    pub fn is_oneshot(&self) -> bool {
        self.0 & ONESHOT != 0
    }
}

impl ops::BitOr for EpollOpt {
    type Output = EpollOpt;

    fn bitor(self, other: EpollOpt) -> EpollOpt {
        EpollOpt(self.0 | other.0)
    }
}
