/// Sliding-window median over the last `N` samples.
///
/// Used on raw sonar altitude, where single-sample spikes are common.
#[derive(Debug, Clone)]
pub struct MedianFilter<const N: usize> {
    window: [f64; N],
    len: usize,
    next: usize,
}

impl<const N: usize> Default for MedianFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MedianFilter<N> {
    pub const fn new() -> Self {
        assert!(N > 0, "median window must hold at least one sample");
        Self {
            window: [0.0; N],
            len: 0,
            next: 0,
        }
    }

    /// Add a sample and return the median of the current window.
    pub fn apply(&mut self, sample: f64) -> f64 {
        self.window[self.next] = sample;
        self.next = (self.next + 1) % N;
        self.len = (self.len + 1).min(N);

        let mut sorted = self.window;
        let filled = &mut sorted[..self.len];
        filled.sort_unstable_by(f64::total_cmp);
        let mid = self.len / 2;
        if self.len % 2 == 1 {
            filled[mid]
        } else {
            0.5 * (filled[mid - 1] + filled[mid])
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn reset(&mut self) {
        self.len = 0;
        self.next = 0;
    }
}
