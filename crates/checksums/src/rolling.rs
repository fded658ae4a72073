use thiserror::Error;

/// Errors that can occur while updating the rolling checksum state.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RollingError {
    /// The checksum window is empty, preventing the rolling update from making progress.
    #[error("rolling checksum requires a non-empty window")]
    EmptyWindow,
    /// The checksum window length exceeds what can be represented in 32 bits.
    #[error("rolling checksum window of {len} bytes exceeds 32-bit limit")]
    WindowTooLarge {
        /// Number of bytes present in the rolling window when the error was raised.
        len: usize,
    },
}

/// Truncates a packed weak checksum to its `weak_len` most-significant bytes.
///
/// Control files store the weak checksum in network order, padded to the
/// declared width, so only the leading bytes of the 32-bit value survive.
/// Both the block-sum table decoder and the scanner probe through this helper
/// so the two sides always agree on the retained bits. Widths outside `1..=4`
/// are clamped to the full value.
///
/// # Examples
///
/// ```
/// use checksums::truncate_weak;
///
/// assert_eq!(truncate_weak(0x1234_5678, 2), 0x1234_0000);
/// assert_eq!(truncate_weak(0x1234_5678, 4), 0x1234_5678);
/// ```
#[must_use]
pub const fn truncate_weak(value: u32, weak_len: usize) -> u32 {
    if weak_len >= 4 {
        value
    } else {
        value & (u32::MAX << (8 * (4 - weak_len)))
    }
}

/// Rolling weak checksum over a sliding window of target-block width.
///
/// The first half (`a`) accumulates the byte sum while the second half (`b`)
/// tracks the sum of the running prefix sums, which for a full window equals
/// the position-weighted sum zsync stores in its block-sum table. Both halves
/// are truncated to 16 bits after every update and the emitted value is the
/// concatenation `(b << 16) | a`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RollingChecksum {
    a: u32,
    b: u32,
    len: usize,
}

impl RollingChecksum {
    /// Creates a new rolling checksum with zeroed state.
    #[must_use]
    pub const fn new() -> Self {
        Self { a: 0, b: 0, len: 0 }
    }

    /// Resets the checksum back to its initial state.
    pub fn reset(&mut self) {
        self.a = 0;
        self.b = 0;
        self.len = 0;
    }

    /// Returns the number of bytes that contributed to the current state.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bytes have been observed yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Updates the checksum with an additional slice of bytes.
    pub fn update(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }

        let mut a = self.a;
        let mut b = self.b;

        let mut iter = chunk.chunks_exact(4);
        for block in &mut iter {
            a = a.wrapping_add(u32::from(block[0]));
            b = b.wrapping_add(a);

            a = a.wrapping_add(u32::from(block[1]));
            b = b.wrapping_add(a);

            a = a.wrapping_add(u32::from(block[2]));
            b = b.wrapping_add(a);

            a = a.wrapping_add(u32::from(block[3]));
            b = b.wrapping_add(a);
        }

        for &byte in iter.remainder() {
            a = a.wrapping_add(u32::from(byte));
            b = b.wrapping_add(a);
        }

        self.a = a & 0xffff;
        self.b = b & 0xffff;
        self.len = self.len.saturating_add(chunk.len());
    }

    /// Updates the checksum by recomputing the state for a fresh window.
    pub fn update_from_window(&mut self, window: &[u8]) {
        self.reset();
        self.update(window);
    }

    /// Returns the current window length as a 32-bit value while validating invariants.
    fn window_len_u32(&self) -> Result<u32, RollingError> {
        if self.len == 0 {
            return Err(RollingError::EmptyWindow);
        }

        u32::try_from(self.len).map_err(|_| RollingError::WindowTooLarge { len: self.len })
    }

    /// Performs the rolling update by removing `outgoing` and appending `incoming`.
    ///
    /// The window length is unchanged: `a ← a − outgoing + incoming` and
    /// `b ← b − window_len · outgoing + a`, both truncated to 16 bits.
    ///
    /// # Errors
    ///
    /// Returns [`RollingError::EmptyWindow`] if the checksum has not been
    /// seeded with a window and [`RollingError::WindowTooLarge`] when the
    /// window length exceeds 32 bits.
    pub fn roll(&mut self, outgoing: u8, incoming: u8) -> Result<(), RollingError> {
        let window_len = self.window_len_u32()?;

        let out = u32::from(outgoing);
        let inn = u32::from(incoming);

        let new_a = self.a.wrapping_sub(out).wrapping_add(inn) & 0xffff;
        let new_b = self
            .b
            .wrapping_sub(window_len.wrapping_mul(out))
            .wrapping_add(new_a)
            & 0xffff;

        self.a = new_a;
        self.b = new_b;
        Ok(())
    }

    /// Returns the checksum in the packed 32-bit representation `(b << 16) | a`.
    #[must_use]
    pub const fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Returns the packed value truncated to its `weak_len` most-significant bytes.
    #[must_use]
    pub const fn truncated(&self, weak_len: usize) -> u32 {
        truncate_weak(self.value(), weak_len)
    }
}
