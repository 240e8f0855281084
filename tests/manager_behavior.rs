use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use statlink_core::config::{CACHE_COMPRESSION_VAR, HOME_VAR, SOURCES_VAR};
use statlink_core::{SdmxManagerBuilder, StatlinkConfig};
use statlink_tests::{
    ecb_driver, exr, exr_ref, source, url, CountingDriver, DataDetail, DataQuery, FaultyDriver,
    FlowRef, Key, MemDriver, MonitorStatus, RecordingListener, SdmxManager, SourceErrorKind,
    StaticMonitoring,
};

#[test]
fn custom_sources_shadow_driver_defaults_and_aliases_resolve() {
    // Given a custom ECB on driver D2 and a driver D whose default ECB has an alias
    let driver_ecb = source("ECB", "D").with_alias("BCE").expect("alias");
    let manager = SdmxManager::builder()
        .driver(Arc::new(MemDriver::new("D").with_source(driver_ecb)))
        .driver(Arc::new(MemDriver::new("D2")))
        .custom_source(source("ECB", "D2"))
        .build();

    // When sources are listed
    let sources = manager.get_sources();

    // Then the custom source wins and the alias points to the driver copy
    assert_eq!(sources["ECB"].driver(), "D2");
    assert_eq!(sources["BCE"].driver(), "D");
    assert!(sources["BCE"].is_alias());
    assert_eq!(sources.keys().collect::<Vec<_>>(), vec!["BCE", "ECB"]);
}

#[test]
fn earlier_registered_driver_wins_over_higher_rank() {
    // Given two drivers declaring ECB, the later one ranked higher
    let manager = SdmxManager::builder()
        .driver(Arc::new(
            MemDriver::new("FIRST").with_rank(0).with_source(source("ECB", "FIRST")),
        ))
        .driver(Arc::new(
            MemDriver::new("SECOND").with_rank(10).with_source(source("ECB", "SECOND")),
        ))
        .build();

    // When sources and drivers are listed
    let ecb = &manager.get_sources()["ECB"];
    let ranked = manager
        .get_drivers()
        .iter()
        .map(|driver| driver.id().to_owned())
        .collect::<Vec<_>>();

    // Then registration order picks the source and rank only orders the listing
    assert_eq!(ecb.driver(), "FIRST");
    assert_eq!(ranked, vec!["SECOND", "FIRST"]);
}

#[test]
fn earlier_registered_driver_serves_a_shared_driver_id() {
    // Given two drivers with the same id, only the first holding data
    let (flow, structure, series) = exr();
    let manager = SdmxManager::builder()
        .driver(Arc::new(
            MemDriver::new("D")
                .with_source(source("ECB", "D"))
                .with_flow(flow, structure, series),
        ))
        .driver(Arc::new(MemDriver::new("D").with_rank(10)))
        .build();

    // When a connection is opened
    let connection = manager.get_connection("ECB").expect("connection");

    // Then the first registered driver answers
    assert_eq!(connection.get_flows().expect("flows").len(), 1);
}

#[test]
fn connection_serves_data_until_closed() {
    // Given a manager with driver D serving ECB
    let manager = SdmxManager::builder().driver(Arc::new(ecb_driver())).build();

    // When a connection is opened and used
    let mut connection = manager.get_connection("ECB").expect("connection");
    let flows = connection.get_flows().expect("flows");
    let data = connection
        .get_data(&exr_ref(), &DataQuery::new(Key::parse("D."), DataDetail::Full))
        .expect("data");

    // Then it answers until closed and refuses afterwards
    assert_eq!(flows.len(), 1);
    assert_eq!(data.data.len(), 2);
    connection.close().expect("close");
    let error = connection.get_flows().expect_err("closed");
    assert_eq!(error.kind(), SourceErrorKind::ConnectionClosed);
    assert!(connection.close().is_ok());
}

#[test]
fn unknown_source_and_missing_driver_are_reported() {
    // Given a custom source targeting a driver nobody registered
    let manager = SdmxManager::builder()
        .driver(Arc::new(ecb_driver()))
        .custom_source(source("ORPHAN", "NOPE"))
        .build();

    // When / Then
    let unknown = manager.get_connection("unknown").err().expect("missing source");
    assert_eq!(unknown.kind(), SourceErrorKind::MissingSource);

    let orphan = manager.get_connection("ORPHAN").err().expect("missing driver");
    assert_eq!(orphan.kind(), SourceErrorKind::MissingDriver);
}

#[test]
fn unexpected_properties_raise_one_event() {
    // Given a listener and a source carrying two properties unknown to driver D
    let listener = Arc::new(RecordingListener::default());
    let manager = SdmxManager::builder()
        .driver(Arc::new(ecb_driver().with_property("detailSupported")))
        .custom_source(
            source("WB", "D")
                .with_property("detailSupported", "true")
                .with_property("zeta", "1")
                .with_property("alpha", "2"),
        )
        .event_listener(listener.clone())
        .build();

    // When connections are opened to a noisy and to a clean source
    manager.get_connection("WB").expect("noisy connection");
    manager.get_connection("ECB").expect("clean connection");

    // Then exactly one event names both properties in order
    assert_eq!(
        listener.events(),
        vec![(
            String::from("WB"),
            String::from("unexpected properties [alpha, zeta] for driver 'D'")
        )]
    );
}

#[test]
fn property_check_is_skipped_without_listener() {
    // Given a source with unknown properties and no event listener
    let driver = CountingDriver::new(ecb_driver());
    let queries = driver.property_queries();
    let manager = SdmxManager::builder().driver(Arc::new(driver)).build();
    let noisy = source("WB", "D").with_property("zeta", "1");

    // When a connection is opened
    manager.get_connection_for(&noisy).expect("connection");

    // Then the driver's properties were never consulted
    assert_eq!(queries.load(Ordering::SeqCst), 0);
}

#[test]
fn property_check_runs_once_with_listener() {
    let driver = CountingDriver::new(ecb_driver());
    let queries = driver.property_queries();
    let listener = Arc::new(RecordingListener::default());
    let manager = SdmxManager::builder()
        .driver(Arc::new(driver))
        .event_listener(listener.clone())
        .build();

    manager
        .get_connection_for(&source("WB", "D").with_property("zeta", "1"))
        .expect("connection");

    assert_eq!(queries.load(Ordering::SeqCst), 1);
    assert_eq!(listener.events().len(), 1);
}

#[test]
fn dialect_falls_back_to_driver_default() {
    let manager = SdmxManager::builder().driver(Arc::new(ecb_driver())).build();

    let plain = source("ECB", "D");
    let explicit = source("ECB", "D").with_dialect("sdmx30");

    assert_eq!(manager.get_dialect(&plain).expect("dialect").as_deref(), Some("sdmx21"));
    assert_eq!(manager.get_dialect(&explicit).expect("dialect").as_deref(), Some("sdmx30"));
    assert_eq!(
        manager.get_dialect(&source("X", "NOPE")).expect_err("no driver").kind(),
        SourceErrorKind::MissingDriver
    );
}

#[test]
fn monitor_reports_dispatch_on_uri_scheme() {
    // Given a monitoring for upptime and sources with and without monitors
    let manager = SdmxManager::builder()
        .driver(Arc::new(ecb_driver()))
        .custom_source(source("UP", "D").with_monitor(url("upptime:/ecb")))
        .custom_source(source("OTHER", "D").with_monitor(url("statuspage:/ecb")))
        .monitoring(Arc::new(StaticMonitoring {
            scheme: "upptime",
            status: MonitorStatus::Up,
        }))
        .build();

    // When / Then
    let report = manager.get_monitor_report("UP").expect("report");
    assert_eq!(report.source, "UP");
    assert_eq!(report.status, MonitorStatus::Up);

    let missing = manager.get_monitor_report("ECB").expect_err("no monitor");
    assert_eq!(missing.kind(), SourceErrorKind::MissingMonitor);

    let unhandled = manager.get_monitor_report("OTHER").expect_err("no backend");
    assert_eq!(unhandled.kind(), SourceErrorKind::MissingMonitoring);
}

#[test]
fn faulty_plugin_connection_is_contained() {
    // Given a driver whose connections panic on every call
    let driver = FaultyDriver::new("FAULTY_DRIVER");
    let closes = Arc::clone(&driver.closes);
    let manager = SdmxManager::builder().driver(Arc::new(driver)).no_cache().build();

    // When the connection is used and dropped
    let connection = manager.get_connection("FAULTY").expect("connection");
    let error = connection.get_flows().expect_err("panic contained");
    assert!(connection.supported_features().expect("advisory").is_empty());
    drop(connection);

    // Then the panic surfaced as an error and the delegate was closed once
    assert_eq!(error.kind(), SourceErrorKind::UnexpectedPluginFailure);
    assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn drivers_are_ordered_by_rank() {
    let manager = SdmxManager::builder()
        .driver(Arc::new(MemDriver::new("LOW").with_rank(1)))
        .driver(Arc::new(MemDriver::new("HIGH").with_rank(10)))
        .driver(Arc::new(MemDriver::new("MID").with_rank(5)))
        .build();

    let ids = manager
        .get_drivers()
        .iter()
        .map(|driver| driver.id().to_owned())
        .collect::<Vec<_>>();

    assert_eq!(ids, vec!["HIGH", "MID", "LOW"]);
}

#[test]
fn builder_from_config_loads_sources_and_file_cache() {
    // Given a home directory and a custom sources file
    let home = tempfile::tempdir().expect("home");
    let sources_file = home.path().join("sources.json");
    fs::write(
        &sources_file,
        r#"[{"id":"ECB","driver":"D","endpoint":"https://ecb.stats.test/sdmx","aliases":["BCE"]}]"#,
    )
    .expect("sources");
    let home_dir = home.path().to_string_lossy().into_owned();
    let sources_path = sources_file.to_string_lossy().into_owned();
    let config = StatlinkConfig::from_lookup(|name| match name {
        HOME_VAR => Some(home_dir.clone()),
        SOURCES_VAR => Some(sources_path.clone()),
        CACHE_COMPRESSION_VAR => Some(String::from("false")),
        _ => None,
    })
    .expect("config");

    // When a manager is built from it and a request goes through the cache
    let manager = SdmxManagerBuilder::from_config(&config)
        .expect("builder")
        .driver(Arc::new(ecb_driver()))
        .build();
    let connection = manager.get_connection("BCE").expect("connection");
    let flow = connection.get_flow(&FlowRef::parse("ECB,EXR,1.0").expect("ref")).expect("flow");

    // Then the cache is enabled and one entry was written under <home>/cache
    assert!(manager.is_cache_enabled());
    assert_eq!(flow.reference, exr_ref());
    let entries = fs::read_dir(config.cache_dir()).expect("cache dir").count();
    assert_eq!(entries, 1);
}

#[test]
fn disabled_cache_in_config_builds_uncached_manager() {
    let home = tempfile::tempdir().expect("home");
    let home_dir = home.path().to_string_lossy().into_owned();
    let config = StatlinkConfig::from_lookup(|name| match name {
        HOME_VAR => Some(home_dir.clone()),
        statlink_core::config::NO_CACHE_VAR => Some(String::from("1")),
        _ => None,
    })
    .expect("config");

    let manager = SdmxManagerBuilder::from_config(&config).expect("builder").build();

    assert!(!manager.is_cache_enabled());
    assert!(!config.cache_dir().exists());
}
