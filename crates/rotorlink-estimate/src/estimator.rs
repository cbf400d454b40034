use crate::error::Result;
use crate::kalman::{check_sample, KalmanFilter};
use crate::low_pass::LowPassFilter;
use crate::median::MedianFilter;

/// Samples in the sonar median window.
pub const Z_WINDOW: usize = 5;

/// Default weight of a new acceleration sample.
pub const DDZ_SMOOTHING: f64 = 0.5;

/// Output of one [`AltitudeEstimator`] step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Median-filtered altitude fed to the Kalman filter.
    pub filtered_z: f64,
    /// Smoothed vertical acceleration fed to the Kalman filter.
    pub filtered_ddz: f64,
    pub position: f64,
    pub velocity: f64,
}

/// Altitude pipeline: median on sonar `z`, low-pass on `ddz`, then the
/// Kalman filter. These are the values the altitude trace reports as
/// `filtered_z`, `filtered_ddz`, `estimated_z` and `estimated_dz`.
#[derive(Debug, Clone)]
pub struct AltitudeEstimator {
    median: MedianFilter<Z_WINDOW>,
    low_pass: LowPassFilter,
    kalman: KalmanFilter,
}

impl AltitudeEstimator {
    /// `alpha` is the acceleration smoothing factor, in (0, 1].
    pub fn new(alpha: f64) -> Result<Self> {
        Ok(Self {
            median: MedianFilter::new(),
            low_pass: LowPassFilter::new(alpha)?,
            kalman: KalmanFilter::new(),
        })
    }

    /// Run one sample through the pipeline.
    ///
    /// Invalid input is rejected before it reaches any filter window.
    pub fn apply(&mut self, z: f64, ddz: f64, dt: f64) -> Result<Estimate> {
        check_sample(z, ddz, dt)?;

        let filtered_z = self.median.apply(z);
        let filtered_ddz = self.low_pass.apply(ddz);
        self.kalman.apply(filtered_z, filtered_ddz, dt);

        Ok(Estimate {
            filtered_z,
            filtered_ddz,
            position: self.kalman.position(),
            velocity: self.kalman.velocity(),
        })
    }

    pub fn kalman(&self) -> &KalmanFilter {
        &self.kalman
    }

    pub fn reset(&mut self) {
        self.median.reset();
        self.low_pass.reset();
        self.kalman.reset();
    }
}

impl Default for AltitudeEstimator {
    fn default() -> Self {
        Self {
            median: MedianFilter::new(),
            low_pass: LowPassFilter::with_alpha(DDZ_SMOOTHING),
            kalman: KalmanFilter::new(),
        }
    }
}
