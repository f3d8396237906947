/*!
    Timestamp and time-base types.
*/

/**
    A rational number, used for stream time bases and frame rates.

    A time base of `1/90000` means one timestamp tick lasts 1/90000 of a
    second.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /**
        Returns this rational as a float, or 0.0 when the denominator is zero.
    */
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    /**
        A time base is usable only when its denominator is non-zero.
    */
    pub const fn is_valid(self) -> bool {
        self.den != 0
    }

    /**
        Convert a tick count in this time base to seconds.
    */
    pub fn ticks_to_seconds(self, ticks: i64) -> f64 {
        ticks as f64 * self.to_f64()
    }

    /**
        Convert seconds to a tick count in this time base.

        Returns 0 when the time base is invalid.
    */
    pub fn seconds_to_ticks(self, seconds: f64) -> i64 {
        let unit = self.to_f64();
        if unit == 0.0 {
            0
        } else {
            (seconds / unit) as i64
        }
    }
}

/**
    A presentation or decode timestamp, in stream time-base ticks.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pts(pub i64);
