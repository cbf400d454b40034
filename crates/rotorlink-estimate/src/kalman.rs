use tracing::trace;

use crate::error::{EstimateError, Result};

/// Process noise: trust placed in the accelerometer-driven prediction.
pub const PROCESS_NOISE: f64 = 10000.0;

/// Measurement noise: trust placed in the direct altitude measurement.
pub const MEASUREMENT_NOISE: f64 = 0.01;

/// Two-state (altitude, vertical speed) Kalman filter.
///
/// Measured vertical acceleration drives the prediction, measured altitude
/// corrects it. Units are whatever the caller feeds in, as long as they are
/// consistent (e.g. m, m/s², s).
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanFilter {
    x: [f64; 2],
    // Row-major [p00, p01, p10, p11].
    p: [f64; 4],
    // Last measured altitude and the vertical speed returned for it.
    z: f64,
    dz: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub const fn new() -> Self {
        Self {
            x: [0.0, 0.0],
            p: [1.0, 0.0, 0.0, 1.0],
            z: 0.0,
            dz: 0.0,
        }
    }

    /// Zero the state and restore the initial covariance.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// One predict/update cycle. Returns the corrected vertical speed.
    ///
    /// `dt` must be positive; use [`try_apply`](Self::try_apply) when the
    /// period comes from an untrusted clock.
    pub fn apply(&mut self, z: f64, ddz: f64, dt: f64) -> f64 {
        debug_assert!(dt > 0.0, "sample period must be positive");

        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;

        // predict
        let x0 = self.x[0] + dt * self.x[1] + 0.5 * dt2 * ddz;
        let x1 = self.x[1] + dt * ddz;

        let [p00, p01, p10, p11] = self.p;
        let a00 = p00 + dt * (p01 + p10) + dt2 * p11 + 0.25 * dt4 * PROCESS_NOISE;
        let a01 = p01 + dt * p11 + 0.5 * dt3 * PROCESS_NOISE;
        let a10 = p10 + dt * p11 + 0.5 * dt3 * PROCESS_NOISE;
        let a11 = p11 + dt2 * PROCESS_NOISE;

        // update, H = [1 0]
        let s = a00 + MEASUREMENT_NOISE;
        let k0 = a00 / s;
        let k1 = a10 / s;
        let residual = z - x0;

        self.x = [x0 + k0 * residual, x1 + k1 * residual];
        self.p = [
            (1.0 - k0) * a00,
            (1.0 - k0) * a01,
            a10 - k1 * a00,
            a11 - k1 * a01,
        ];

        self.z = z;
        self.dz = self.x[1];

        trace!(z, ddz, dt, position = self.x[0], velocity = self.x[1], "kalman step");
        self.dz
    }

    /// Checked variant of [`apply`](Self::apply).
    pub fn try_apply(&mut self, z: f64, ddz: f64, dt: f64) -> Result<f64> {
        check_sample(z, ddz, dt)?;
        Ok(self.apply(z, ddz, dt))
    }

    /// Estimated altitude.
    pub fn position(&self) -> f64 {
        self.x[0]
    }

    /// Estimated vertical speed.
    pub fn velocity(&self) -> f64 {
        self.x[1]
    }

    /// Altitude measurement fed to the last step (0 before the first).
    pub fn last_z(&self) -> f64 {
        self.z
    }

    /// Vertical speed returned by the last step (0 before the first).
    pub fn last_dz(&self) -> f64 {
        self.dz
    }

    pub fn state(&self) -> [f64; 2] {
        self.x
    }

    pub fn covariance(&self) -> [f64; 4] {
        self.p
    }
}

/// Reject a period that is not strictly positive and non-finite readings.
pub(crate) fn check_sample(z: f64, ddz: f64, dt: f64) -> Result<()> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(EstimateError::InvalidPeriod { dt });
    }
    if !z.is_finite() {
        return Err(EstimateError::NonFinite { name: "z" });
    }
    if !ddz.is_finite() {
        return Err(EstimateError::NonFinite { name: "ddz" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_state() {
        let mut kf = KalmanFilter::new();
        kf.apply(3.0, 1.0, 0.02);
        kf.reset();
        assert_eq!(kf.state(), [0.0, 0.0]);
        assert_eq!(kf.covariance(), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(kf.last_z(), 0.0);
        assert_eq!(kf.last_dz(), 0.0);
    }

    #[test]
    fn remembers_last_measurement_and_speed() {
        let mut kf = KalmanFilter::new();
        let first = kf.apply(2.5, 0.0, 0.01);
        assert_eq!(kf.last_z(), 2.5);
        assert_eq!(kf.last_dz(), first);

        let second = kf.apply(2.7, 0.3, 0.01);
        assert_eq!(kf.last_z(), 2.7);
        assert_eq!(kf.last_dz(), second);
        assert_eq!(kf.last_dz(), kf.velocity());
    }

    #[test]
    fn constant_measurement_converges() {
        let mut kf = KalmanFilter::new();
        let mut dz = f64::NAN;
        for _ in 0..500 {
            dz = kf.apply(100.0, 0.0, 0.01);
        }
        assert!((kf.position() - 100.0).abs() < 1e-6);
        assert!(kf.velocity().abs() < 1e-6);
        assert_eq!(dz, kf.velocity());
    }

    #[test]
    fn tracks_constant_climb_rate() {
        let mut kf = KalmanFilter::new();
        let mut t = 0.0;
        for _ in 0..500 {
            t += 0.01;
            kf.apply(50.0 * t, 0.0, 0.01);
        }
        assert!((kf.velocity() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn acceleration_feeds_prediction() {
        let mut kf = KalmanFilter::new();
        let mut t = 0.0;
        for _ in 0..1000 {
            t += 0.01;
            kf.apply(t * t, 2.0, 0.01);
        }
        assert!((kf.velocity() - 2.0 * t).abs() < 1e-3);
    }

    #[test]
    fn deterministic() {
        let mut a = KalmanFilter::new();
        let mut b = KalmanFilter::new();
        for i in 0..50 {
            let z = f64::from(i).sin();
            assert_eq!(a.apply(z, 0.3, 0.005), b.apply(z, 0.3, 0.005));
        }
        assert_eq!(a, b);
    }

    #[test]
    fn covariance_stays_symmetric() {
        let mut kf = KalmanFilter::new();
        for _ in 0..200 {
            kf.apply(1.0, 0.5, 0.01);
        }
        let [_, p01, p10, _] = kf.covariance();
        assert!((p01 - p10).abs() < 1e-9);
    }

    #[test]
    fn try_apply_rejects_bad_input() {
        let mut kf = KalmanFilter::new();
        assert_eq!(
            kf.try_apply(1.0, 0.0, 0.0),
            Err(EstimateError::InvalidPeriod { dt: 0.0 })
        );
        assert!(matches!(
            kf.try_apply(1.0, 0.0, -0.01),
            Err(EstimateError::InvalidPeriod { .. })
        ));
        assert!(matches!(
            kf.try_apply(1.0, 0.0, f64::NAN),
            Err(EstimateError::InvalidPeriod { .. })
        ));
        assert_eq!(
            kf.try_apply(f64::INFINITY, 0.0, 0.01),
            Err(EstimateError::NonFinite { name: "z" })
        );
        assert_eq!(
            kf.try_apply(1.0, f64::NAN, 0.01),
            Err(EstimateError::NonFinite { name: "ddz" })
        );
        assert_eq!(kf.state(), [0.0, 0.0]);
        assert!(kf.try_apply(1.0, 0.0, 0.01).is_ok());
    }
}
