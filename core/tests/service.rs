//! Service lifecycle tests: signal routing and host bindings.

mod common;

use common::{instance, FakeHost, PLAYER, TERRITORY};
use location_core::{
    config::LocationConfig, signal::HostSignal, snapshot::Music, LocationService,
};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn service(host: &std::sync::Arc<FakeHost>, tmp: &TempDir) -> LocationService {
    let config = LocationConfig { save_period_secs: 3600, ..LocationConfig::default() };
    LocationService::init(config, tmp.path(), host.bindings()).expect("init service")
}

#[test]
fn init_primes_territory_and_music_from_host() {
    let tmp = TempDir::new().unwrap();
    let host = FakeHost::new();
    let mut service = service(&host, &tmp);

    assert_eq!(service.last_identity(), Some(PLAYER));
    service.tick();
    let s = service.get(PLAYER);
    assert_eq!(s.territory_type_id, TERRITORY);
    assert_eq!(s.music(), Music { id: 7, path: Some("music/ffxiv/song_7.scd".into()) });
    service.dispose();
}

#[test]
fn signals_route_to_the_pipeline() {
    let tmp = TempDir::new().unwrap();
    let host = FakeHost::new();
    host.update(|h| h.instances = vec![instance(1, true), instance(2, false)]);
    let mut service = service(&host, &tmp);
    service.tick();
    assert!(!service.refresh_pending());

    service.handle(HostSignal::TerritoryChanged { territory_id: 250 });
    service.handle(HostSignal::SongChanged { song_id: 0 });
    service.tick();
    let s = service.get(PLAYER);
    assert_eq!(s.territory_path, "ffxiv/bg/territory/250");
    assert_eq!(s.territory_type_id, 250);
    assert_eq!(s.music(), Music { id: 0, path: None });

    service.handle(HostSignal::InstanceActiveChanged { instance_id: 77, active: true });
    assert!(!service.refresh_pending());
    service.handle(HostSignal::InstanceActiveChanged { instance_id: 2, active: true });
    assert!(service.refresh_pending());

    host.update(|h| h.instances = vec![instance(1, true), instance(2, true)]);
    service.tick();
    assert_eq!(service.get(PLAYER).active, BTreeSet::from([1, 2]));

    service.handle(HostSignal::LayoutChanged);
    assert!(service.refresh_pending());
    service.dispose();
}

#[test]
fn instance_signals_need_a_live_character() {
    let tmp = TempDir::new().unwrap();
    let host = FakeHost::new();
    host.update(|h| h.instances = vec![instance(1, true)]);
    let mut service = service(&host, &tmp);
    service.tick();

    host.update(|h| h.live = None);
    service.on_instance_active_changed(1, false);
    assert!(!service.refresh_pending());
    service.dispose();
}

#[test]
fn login_switches_the_active_identity() {
    let tmp = TempDir::new().unwrap();
    let host = FakeHost::new();
    host.update(|h| h.identity = None);
    let mut service = service(&host, &tmp);
    assert_eq!(service.last_identity(), None);
    assert_eq!(service.tick(), None);

    service.handle(HostSignal::Login { identity: 0xBEEF });
    assert_eq!(service.last_identity(), Some(0xBEEF));

    host.update(|h| h.identity = Some(0xBEEF));
    assert_eq!(service.tick(), Some(0xBEEF));
    assert!(service.store().contains(0xBEEF));
    service.dispose();
}

#[test]
fn signals_use_a_tagged_wire_form() {
    let json = serde_json::to_string(&HostSignal::InstanceActiveChanged {
        instance_id: 5,
        active:      false,
    })
    .unwrap();
    assert_eq!(json, r#"{"type":"instance_active_changed","instance_id":5,"active":false}"#);
    let back: HostSignal = serde_json::from_str(r#"{"type":"logout"}"#).unwrap();
    assert_eq!(back, HostSignal::Logout);
    assert_eq!(back.name(), "logout");
}

#[test]
fn config_round_trips_through_a_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("location.json");
    assert_eq!(LocationConfig::load(&path).unwrap(), LocationConfig::default());

    std::fs::write(&path, r#"{"save_mount":false,"save_period_secs":5,"unknown":1}"#).unwrap();
    let config = LocationConfig::load(&path).unwrap();
    assert!(!config.save_mount);
    assert_eq!(config.save_period_secs, 5);
    assert!(config.save_layout);

    std::fs::write(&path, "{ nope").unwrap();
    assert!(matches!(
        LocationConfig::load(&path),
        Err(location_core::LocationError::Config { .. })
    ));
}
