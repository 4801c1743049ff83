//! Periodic weather fetch-and-store action.

use std::sync::Arc;

use async_trait::async_trait;

use crate::poller::{PollError, TaskAction};
use crate::weather::WeatherSource;
use crate::{WeatherRecord, WeatherStore};

/// Fetches the current conditions and persists them under a location name.
pub struct WeatherAction {
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn WeatherStore>,
    location: String,
}

impl WeatherAction {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        store: Arc<dyn WeatherStore>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            location: location.into(),
        }
    }
}

#[async_trait]
impl TaskAction for WeatherAction {
    async fn run(&self) -> Result<(), PollError> {
        let report = self.source.current().await?;
        let record = WeatherRecord {
            id: None,
            time: report.observed_at,
            name: self.location.clone(),
            lat: report.lat,
            lon: report.lon,
            temperature: report.temperature,
            humidity: report.humidity,
            feels_like: report.feels_like,
        };
        self.store.save_weather(&record).await?;
        tracing::info!(location = %self.location, temperature = record.temperature, "Weather stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use crate::weather::WeatherReport;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then reports fixed conditions.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherSource for Flaky {
        async fn current(&self) -> Result<WeatherReport, PollError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(PollError::Sampler("service unavailable".to_string()));
            }
            Ok(WeatherReport {
                lat: 52.5,
                lon: 13.4,
                observed_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                temperature: 3.0,
                humidity: 90.0,
                feels_like: 0.5,
            })
        }
    }

    #[tokio::test]
    async fn test_stores_report_under_location() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(Flaky {
            failures: 1,
            calls: AtomicUsize::new(0),
        });
        let action = WeatherAction::new(source, store.clone(), "Home");

        assert!(action.run().await.is_err());
        action.run().await.unwrap();

        let saved = store.weather();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "Home");
        assert_eq!(saved[0].feels_like, 0.5);
    }
}
