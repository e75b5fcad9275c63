//! Multi-sample averaging over the sensor link

use super::{SensorError, SensorLink, SoilMeasurement};
use crate::core::transport::LinkTransport;
use std::time::Duration;
use tokio::time::sleep;

/// Progress observer invoked before each sample.
///
/// Decouples protocol timing from presentation: the caller decides whether
/// a sample tick updates a display, a progress bar, or nothing.
pub trait SampleObserver {
    /// Called with the 1-based sample index and the total count
    fn on_sample(&mut self, index: usize, total: usize);
}

/// Observer that ignores progress
pub struct NullObserver;

impl SampleObserver for NullObserver {
    fn on_sample(&mut self, _index: usize, _total: usize) {}
}

/// Drives the sensor link across N samples and averages the valid ones.
pub struct SamplingAggregator<T: LinkTransport> {
    link: SensorLink<T>,
}

impl<T: LinkTransport> SamplingAggregator<T> {
    /// Wrap a sensor link
    pub fn new(link: SensorLink<T>) -> Self {
        Self { link }
    }

    /// Borrow the wrapped link
    pub fn link(&self) -> &SensorLink<T> {
        &self.link
    }

    /// Take `samples` sequential readings and return their arithmetic mean.
    ///
    /// Per-sample timeouts and invalid frames are skipped; only transport
    /// failures abort the run. The inter-sample delay is applied between
    /// reads, not after the last one. If nothing was valid the result is
    /// [`SensorError::NoValidSamples`]; there is no zero-valid division.
    pub async fn take_averaged(
        &mut self,
        samples: usize,
        observer: &mut dyn SampleObserver,
    ) -> Result<SoilMeasurement, SensorError> {
        let delay = Duration::from_millis(self.link.config().read_delay_ms);
        let mut sums = [0f32; 7];
        let mut valid = 0usize;

        for i in 0..samples {
            observer.on_sample(i + 1, samples);

            match self.link.read_measurement().await {
                Ok(m) => {
                    sums[0] += m.humidity;
                    sums[1] += m.temperature;
                    sums[2] += m.ec;
                    sums[3] += m.ph;
                    sums[4] += m.nitrogen;
                    sums[5] += m.phosphorus;
                    sums[6] += m.potassium;
                    valid += 1;
                }
                Err(e @ (SensorError::Timeout { .. } | SensorError::Frame(_))) => {
                    tracing::warn!(sample = i + 1, error = %e, "skipping failed sample");
                }
                Err(e) => return Err(e),
            }

            if i + 1 < samples {
                sleep(delay).await;
            }
        }

        if valid == 0 {
            tracing::warn!(attempted = samples, "no valid sensor readings");
            return Err(SensorError::NoValidSamples { attempted: samples });
        }

        tracing::info!(valid, attempted = samples, "averaged soil reading");
        let n = valid as f32;
        Ok(SoilMeasurement {
            humidity: sums[0] / n,
            temperature: sums[1] / n,
            ec: sums[2] / n,
            ph: sums[3] / n,
            nitrogen: sums[4] / n,
            phosphorus: sums[5] / n,
            potassium: sums[6] / n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sensor::tests::frame_for;
    use crate::core::sensor::SensorConfig;
    use crate::core::transport::fake::FakeLink;
    use tokio::time::Instant;

    struct Recorder(Vec<(usize, usize)>);

    impl SampleObserver for Recorder {
        fn on_sample(&mut self, index: usize, total: usize) {
            self.0.push((index, total));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_averages_only_valid_samples() {
        let mut fake = FakeLink::new();
        fake.reply(&frame_for([500, 250, 1000, 70, 40, 30, 100]));
        fake.reply(&[0x01, 0x03]); // short: skipped
        fake.reply(&frame_for([300, 230, 2000, 60, 20, 10, 300]));
        fake.reply(&[]); // nothing at all: skipped
        fake.reply(&frame_for([400, 240, 1500, 65, 30, 20, 200]));

        let link = SensorLink::new(fake, SensorConfig::default());
        let mut aggregator = SamplingAggregator::new(link);
        let mut recorder = Recorder(Vec::new());

        let m = aggregator.take_averaged(5, &mut recorder).await.unwrap();
        assert_eq!(m.humidity, 40.0);
        assert_eq!(m.temperature, 24.0);
        assert_eq!(m.ec, 1500.0);
        assert_eq!(m.ph, 6.5);
        assert_eq!(m.potassium, 200.0);

        assert_eq!(recorder.0, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_samples_failing() {
        let fake = FakeLink::new(); // never replies
        let link = SensorLink::new(fake, SensorConfig::default());
        let mut aggregator = SamplingAggregator::new(link);

        let err = aggregator
            .take_averaged(3, &mut NullObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, SensorError::NoValidSamples { attempted: 3 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_samples_not_after_last() {
        let mut fake = FakeLink::new();
        for _ in 0..3 {
            fake.reply(&frame_for([500, 250, 1000, 70, 40, 30, 100]));
        }
        let link = SensorLink::new(fake, SensorConfig::default());
        let mut aggregator = SamplingAggregator::new(link);

        let started = Instant::now();
        aggregator.take_averaged(3, &mut NullObserver).await.unwrap();
        let elapsed = started.elapsed();

        // two inter-sample delays, not three
        assert!(elapsed >= Duration::from_millis(2000));
        assert!(elapsed < Duration::from_millis(3000));
    }
}
