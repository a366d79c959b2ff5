use std::{fmt, ops};

/// A set of readiness events. Only `readable`/`writable` are guaranteed
/// portable; `error`/`hup` are hints (see epoll(7)).
#[derive(Copy, PartialEq, Eq, Clone, PartialOrd, Ord)]
pub struct Ready(usize);

const READABLE: usize = 0b0001;
const WRITABLE: usize = 0b0010;
const ERROR: usize = 0b0100;
const HUP: usize = 0b1000;

impl Ready {
    pub fn empty() -> Ready {
        Ready(0)
    }

    pub fn readable() -> Ready {
        Ready(READABLE)
    }

    pub fn writable() -> Ready {
        Ready(WRITABLE)
    }

    pub fn error() -> Ready {
        Ready(ERROR)
    }

    pub fn hup() -> Ready {
        Ready(HUP)
    }

    pub fn is_readable(&self) -> bool {
        self.0 & READABLE != 0
    }

    pub fn is_writable(&self) -> bool {
        self.0 & WRITABLE != 0
    }

    pub fn is_error(&self) -> bool {
        self.0 & ERROR != 0
    }

    pub fn is_hup(&self) -> bool {
        self.0 & HUP != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl ops::BitOr for Ready {
    type Output = Ready;

    fn bitor(self, other: Ready) -> Ready {
        Ready(self.0 | other.0)
    }
}

impl ops::BitOrAssign for Ready {
    fn bitor_assign(&mut self, other: Ready) {
        self.0 |= other.0;
    }
}

impl ops::BitAnd for Ready {
    type Output = Ready;

    fn bitand(self, other: Ready) -> Ready {
        Ready(self.0 & other.0)
    }
}

impl fmt::Debug for Ready {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        if self.is_readable() {
            set.entry(&"readable");
        }
        if self.is_writable() {
            set.entry(&"writable");
        }
        if self.is_error() {
            set.entry(&"error");
        }
        if self.is_hup() {
            set.entry(&"hup");
        }
        set.finish()
    }
}
