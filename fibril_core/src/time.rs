// Copyright 2026 the Fibril Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host time used to meter work slices.
//!
//! [`HostTime`] is a point on the host's monotonic clock, in whatever tick
//! unit the host scheduler reports. [`Duration`] is a span in the same units;
//! slice budgets report their remaining time as a [`Duration`].
//!
//! [`Timebase`] converts ticks to nanoseconds for diagnostics (trace export).
//! Conversions use `u128` intermediates so that large tick counts do not
//! overflow.

use core::fmt;
use core::ops::{Add, Sub};

/// A point in time expressed as host monotonic ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Converts this host time to nanoseconds using the given timebase.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; truncation back to u64 is intentional"
    )]
    pub const fn to_nanos(self, timebase: Timebase) -> u64 {
        let wide = self.0 as u128 * timebase.numer as u128 / timebase.denom as u128;
        wide as u64
    }

    /// Returns the span from `earlier` to `self`, or zero if `earlier` is later.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Returns the span from `self` until `deadline`, or zero once it has passed.
    #[inline]
    #[must_use]
    pub const fn until(self, deadline: Self) -> Duration {
        deadline.saturating_duration_since(self)
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        self.saturating_duration_since(rhs)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// A span of host ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// The empty span.
    pub const ZERO: Self = Self(0);

    /// The longest representable span; used by budgets that never run out.
    pub const MAX: Self = Self(u64::MAX);

    /// Returns the raw tick count.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Creates a span from nanoseconds under the given timebase.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; truncation back to u64 is intentional"
    )]
    pub const fn from_nanos(nanos: u64, timebase: Timebase) -> Self {
        let wide = nanos as u128 * timebase.denom as u128 / timebase.numer as u128;
        Self(wide as u64)
    }

    /// Creates a span from whole milliseconds under the given timebase.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64, timebase: Timebase) -> Self {
        Self::from_nanos(millis.saturating_mul(1_000_000), timebase)
    }

    /// Converts this span to nanoseconds.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; truncation back to u64 is intentional"
    )]
    pub const fn to_nanos(self, timebase: Timebase) -> u64 {
        let wide = self.0 as u128 * timebase.numer as u128 / timebase.denom as u128;
        wide as u64
    }

    /// Saturating subtraction.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Duration {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({})", self.0)
    }
}

/// Rational conversion factor from ticks to nanoseconds.
///
/// `nanoseconds = ticks * numer / denom`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    /// Numerator of the ticks-to-nanoseconds ratio.
    pub numer: u32,
    /// Denominator of the ticks-to-nanoseconds ratio.
    pub denom: u32,
}

impl Timebase {
    /// A timebase where ticks are already nanoseconds.
    pub const NANOS: Self = Self { numer: 1, denom: 1 };

    /// A timebase where one tick is one microsecond.
    pub const MICROS: Self = Self {
        numer: 1_000,
        denom: 1,
    };

    /// Creates a new timebase.
    ///
    /// # Panics
    ///
    /// Panics if either component is zero.
    #[inline]
    #[must_use]
    pub const fn new(numer: u32, denom: u32) -> Self {
        assert!(numer != 0, "timebase numerator must be non-zero");
        assert!(denom != 0, "timebase denominator must be non-zero");
        Self { numer, denom }
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}/{})", self.numer, self.denom)
    }
}
