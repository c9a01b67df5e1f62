/// Trailing audio context fed to the model. The length never changes; each
/// hop pushes the oldest samples out of the front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollingWindow {
    samples: Vec<f32>,
}

impl RollingWindow {
    /// A window of silence.
    pub fn new(length: usize) -> Self {
        Self {
            samples: vec![0.0; length],
        }
    }

    /// Shift the window left by `hop.len()` and write `hop` into the tail.
    ///
    /// A hop longer than the window only keeps its last `len()` samples.
    pub fn advance(&mut self, hop: &[f32]) {
        let length = self.samples.len();
        if hop.len() >= length {
            self.samples.copy_from_slice(&hop[hop.len() - length..]);
            return;
        }

        let shift = hop.len();
        self.samples.copy_within(shift.., 0);
        self.samples[length - shift..].copy_from_slice(hop);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_silent() {
        let window = RollingWindow::new(6);
        assert_eq!(window.len(), 6);
        assert!(window.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_advance_shifts_and_appends() {
        let mut window = RollingWindow::new(6);

        window.advance(&[1.0, 2.0]);
        assert_eq!(window.as_slice(), &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0]);

        window.advance(&[3.0, 4.0]);
        assert_eq!(window.as_slice(), &[0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);

        window.advance(&[5.0, 6.0]);
        window.advance(&[7.0, 8.0]);
        assert_eq!(window.as_slice(), &[3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(window.len(), 6);
    }

    #[test]
    fn test_oversized_hop_keeps_tail() {
        let mut window = RollingWindow::new(3);
        window.advance(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(window.as_slice(), &[3.0, 4.0, 5.0]);
    }
}
