use color_eyre::Result;
use geofix::{
    app::App,
    config::{Config, SessionMode, SourceKind},
    events::{forward_watch_end, Event, EventHandler},
    geocode::NominatimGeocoder,
    location::IpPositionSource,
    logging,
    replay::ReplaySource,
    source::PositionSource,
    Locator, LocatorSettings,
};
use std::{sync::Arc, time::Duration};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = Config::load();
    let _log_guard = logging::initialize_logging(&config.logging);

    let source = build_source(&config)?;
    let geocoder = Arc::new(NominatimGeocoder::new(&config.geocoder)?);
    let settings = LocatorSettings::from(&config.accuracy);
    let target = settings.target_meters;
    let locator = Locator::new(source, geocoder, settings);

    let mut events = EventHandler::with_ctrl_c();
    let mut watch = None;
    let mut app = match config.session.mode {
        SessionMode::Progressive => {
            let tx = events.tx.clone();
            tokio::spawn(async move {
                let updates = tx.clone();
                let on_update = move |reading: &geofix::LocationReading| {
                    updates.send(Event::Reading(reading.clone())).ok();
                };
                let event = match locator.get_location_with_improvement(Some(on_update)).await {
                    Ok(reading) => Event::Finished(reading),
                    Err(e) => Event::Failed(e),
                };
                tx.send(event).ok();
            });
            App::new(config.session.output, None)
        }
        SessionMode::Continuous => {
            let tx = events.tx.clone();
            let handle = locator.watch_with_continuous_improvement(
                move |reading| {
                    tx.send(Event::Reading(reading)).ok();
                },
                target,
            );
            forward_watch_end(handle.clone(), events.tx.clone());
            watch = Some(handle);
            info!("Watching until {}m accuracy or Ctrl-C", target);
            App::new(config.session.output, Some(target))
        }
    };

    info!("Session started in {:?} mode", config.session.mode);
    while !app.should_quit {
        match events.next().await {
            Some(event) => {
                if let Some(line) = app.handle(event) {
                    println!("{}", line);
                }
            }
            None => break,
        }
    }

    if let Some(handle) = watch {
        handle.stop();
    }
    info!("Session ended after {} updates", app.updates);
    Ok(())
}

fn build_source(config: &Config) -> Result<Arc<dyn PositionSource>> {
    let location = &config.location;
    Ok(match location.source {
        SourceKind::Ip => Arc::new(IpPositionSource::new(
            location.lookup_ip.clone(),
            Duration::from_millis(location.poll_interval_ms),
        )),
        SourceKind::Replay => Arc::new(ReplaySource::from_csv(&location.replay_path)?),
    })
}
