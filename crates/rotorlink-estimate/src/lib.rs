//! Altitude state estimation for the flight controller.
//!
//! [`KalmanFilter`] fuses measured altitude with measured vertical
//! acceleration into an altitude/vertical-speed estimate. The sonar and
//! accelerometer readings are usually pre-filtered with [`MedianFilter`]
//! and [`LowPassFilter`]; [`AltitudeEstimator`] chains all three.
//! [`PeriodClock`] supplies the sample period.

pub mod clock;
pub mod error;
pub mod estimator;
pub mod kalman;
pub mod low_pass;
pub mod median;

pub use clock::PeriodClock;
pub use error::{EstimateError, Result};
pub use estimator::{AltitudeEstimator, Estimate, DDZ_SMOOTHING, Z_WINDOW};
pub use kalman::{KalmanFilter, MEASUREMENT_NOISE, PROCESS_NOISE};
pub use low_pass::LowPassFilter;
pub use median::MedianFilter;
