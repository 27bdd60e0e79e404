use crate::config::OutputFormat;
use crate::continuous::WatchEnd;
use crate::error::LocationError;
use crate::events::Event;
use crate::models::LocationReading;

/// State of one acquisition session in the binary.
pub struct App {
    pub output: OutputFormat,
    /// Continuous sessions quit once a reading gets this accurate.
    pub target_accuracy: Option<f64>,
    pub latest: Option<LocationReading>,
    pub updates: usize,
    pub error: Option<LocationError>,
    pub should_quit: bool,
}

impl App {
    pub fn new(output: OutputFormat, target_accuracy: Option<f64>) -> Self {
        Self {
            output,
            target_accuracy,
            latest: None,
            updates: 0,
            error: None,
            should_quit: false,
        }
    }

    /// Applies an event and returns the line to print for it, if any.
    pub fn handle(&mut self, event: Event) -> Option<String> {
        match event {
            Event::Reading(reading) => {
                self.updates += 1;
                let line = self.render(&reading);
                if let (Some(target), Some(accuracy)) = (self.target_accuracy, reading.accuracy) {
                    if accuracy <= target {
                        self.should_quit = true;
                    }
                }
                self.latest = Some(reading);
                Some(line)
            }
            Event::Finished(reading) => {
                self.should_quit = true;
                // The final reading was already printed as an update.
                let repeat = self.latest.as_ref() == Some(&reading);
                self.latest = Some(reading);
                if repeat {
                    None
                } else {
                    self.latest.as_ref().map(|r| self.render(r))
                }
            }
            Event::Failed(error) => {
                self.should_quit = true;
                self.error = Some(error);
                Some(format!("error: {}", error))
            }
            Event::WatchEnded(WatchEnd::Failed(error)) => self.handle(Event::Failed(error)),
            // The update for the target reading is still on its way.
            Event::WatchEnded(WatchEnd::TargetReached) => None,
            Event::WatchEnded(WatchEnd::SourceClosed) => {
                self.should_quit = true;
                Some("watch ended: location source closed".to_string())
            }
            Event::WatchEnded(WatchEnd::Stopped) | Event::Shutdown => {
                self.should_quit = true;
                None
            }
        }
    }

    fn render(&self, reading: &LocationReading) -> String {
        match self.output {
            OutputFormat::Json => serde_json::to_string(reading)
                .unwrap_or_else(|e| format!("error: could not encode reading: {}", e)),
            OutputFormat::Text => {
                let accuracy = reading
                    .accuracy
                    .map(|a| format!("±{:.0}m", a))
                    .unwrap_or_else(|| "±?m".to_string());
                format!(
                    "#{} {:.6}, {:.6} {} {} ({})",
                    self.updates,
                    reading.latitude,
                    reading.longitude,
                    accuracy,
                    reading.place_name.as_deref().unwrap_or("-"),
                    reading.address.as_deref().unwrap_or("-"),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fix, Place};

    fn reading(accuracy: f64) -> LocationReading {
        LocationReading::accept(Fix::new(37.7749, -122.4194, Some(accuracy))).with_place(Place {
            address: "Market St, San Francisco".to_string(),
            place_name: "Market St".to_string(),
        })
    }

    #[test]
    fn text_line_shows_accuracy_and_place() {
        let mut app = App::new(OutputFormat::Text, None);
        let line = app.handle(Event::Reading(reading(42.0))).unwrap();

        assert_eq!(
            line,
            "#1 37.774900, -122.419400 ±42m Market St (Market St, San Francisco)"
        );
        assert_eq!(app.updates, 1);
        assert!(!app.should_quit);
    }

    #[test]
    fn json_line_is_camel_case() {
        let mut app = App::new(OutputFormat::Json, None);
        let line = app.handle(Event::Reading(reading(42.0))).unwrap();
        assert!(line.contains("\"placeName\":\"Market St\""));
    }

    #[test]
    fn target_accuracy_ends_session() {
        let mut app = App::new(OutputFormat::Text, Some(10.0));
        app.handle(Event::Reading(reading(30.0)));
        assert!(!app.should_quit);
        app.handle(Event::Reading(reading(9.0)));
        assert!(app.should_quit);
    }

    #[test]
    fn finished_reading_is_not_printed_twice() {
        let mut app = App::new(OutputFormat::Text, None);
        let final_reading = reading(12.0);
        app.handle(Event::Reading(final_reading.clone()));

        assert_eq!(app.handle(Event::Finished(final_reading)), None);
        assert!(app.should_quit);
    }

    #[test]
    fn failure_is_recorded() {
        let mut app = App::new(OutputFormat::Text, None);
        let line = app.handle(Event::Failed(LocationError::PermissionDenied));

        assert_eq!(app.error, Some(LocationError::PermissionDenied));
        assert!(line.unwrap().starts_with("error: Location permission denied"));
        assert!(app.should_quit);
    }

    #[test]
    fn fatal_watch_end_stops_the_session() {
        let mut app = App::new(OutputFormat::Text, Some(10.0));
        let line = app.handle(Event::WatchEnded(WatchEnd::Failed(
            LocationError::PermissionDenied,
        )));

        assert!(app.should_quit);
        assert_eq!(app.error, Some(LocationError::PermissionDenied));
        assert!(line.unwrap().starts_with("error:"));
    }

    #[test]
    fn target_watch_end_waits_for_final_update() {
        let mut app = App::new(OutputFormat::Text, Some(10.0));
        assert_eq!(app.handle(Event::WatchEnded(WatchEnd::TargetReached)), None);
        assert!(!app.should_quit);

        app.handle(Event::Reading(reading(8.0)));
        assert!(app.should_quit);
    }

    #[test]
    fn closed_source_stops_the_session() {
        let mut app = App::new(OutputFormat::Text, Some(10.0));
        assert!(app.handle(Event::WatchEnded(WatchEnd::SourceClosed)).is_some());
        assert!(app.should_quit);
    }
}
