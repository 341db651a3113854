//! Operating state of the driver.

/// Cached operating state.
///
/// Transitions follow `Reset -> Disabled -> Enabled -> Disabled -> Reset`.
/// The cached value is re-derived from the HiZ status bit on most calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Reset line asserted; the chip does not answer.
    #[default]
    Reset,
    /// Configured, power bridges in high impedance.
    Disabled,
    /// Power bridges active.
    Enabled,
}

impl State {
    /// State name for display/debugging.
    pub const fn name(self) -> &'static str {
        match self {
            State::Reset => "Reset",
            State::Disabled => "Disabled",
            State::Enabled => "Enabled",
        }
    }
}

impl core::fmt::Display for State {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
