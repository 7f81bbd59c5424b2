//! Byte budgets for prompt assembly.
//!
//! A [`Budget`] hands out sub-budgets that can never exceed what the parent
//! has left, so nested percentage splits stay within the total.

/// A byte allowance with a running total of what has been spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    limit: usize,
    used: usize,
}

impl Budget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.used
    }

    /// A sub-budget of `fraction` of what is left. Nothing is spent until the
    /// child is [absorbed](Self::absorb).
    pub fn take(&self, fraction: f64) -> Budget {
        let fraction = fraction.clamp(0.0, 1.0);
        Budget::new((self.remaining() as f64 * fraction).floor() as usize)
    }

    /// A sub-budget of at most `max` bytes.
    pub fn take_at_most(&self, max: usize) -> Budget {
        Budget::new(max.min(self.remaining()))
    }

    /// A sub-budget of everything left except `reserve` bytes.
    pub fn take_leaving(&self, reserve: usize) -> Budget {
        Budget::new(self.remaining().saturating_sub(reserve))
    }

    pub fn fits(&self, len: usize) -> bool {
        len <= self.remaining()
    }

    /// Spend `len` bytes if they fit. Returns whether anything was spent.
    pub fn charge(&mut self, len: usize) -> bool {
        if self.fits(len) {
            self.used += len;
            true
        } else {
            false
        }
    }

    /// Append `text` to `out` if it fits.
    pub fn append(&mut self, out: &mut String, text: &str) -> bool {
        if self.charge(text.len()) {
            out.push_str(text);
            true
        } else {
            false
        }
    }

    /// Spend what a child budget spent, capped at what is left here.
    pub fn absorb(&mut self, child: Budget) {
        self.used = (self.used + child.used).min(self.limit);
    }
}
