use std::sync::Arc;

use statlink_core::{validate_driver_id, FailsafeDriver};
use statlink_tests::{
    ecb_driver, source, CountingDriver, DataDetail, DataQuery, Driver, DriverContext, Key,
    MemDriver, SourceErrorKind,
};

#[derive(Clone)]
struct DriverCase {
    name: &'static str,
    driver: Arc<dyn Driver>,
}

fn driver_cases() -> Vec<DriverCase> {
    vec![
        DriverCase {
            name: "mem",
            driver: Arc::new(ecb_driver()),
        },
        DriverCase {
            name: "failsafe mem",
            driver: FailsafeDriver::wrap(Arc::new(ecb_driver())),
        },
        DriverCase {
            name: "counting mem",
            driver: Arc::new(CountingDriver::new(ecb_driver())),
        },
    ]
}

#[test]
fn drivers_declare_valid_ids_and_sources() {
    for case in driver_cases() {
        let id = case.driver.id().to_owned();
        validate_driver_id(&id).unwrap_or_else(|error| {
            panic!("driver '{}' has an invalid id: {error}", case.name)
        });

        let sources = case.driver.default_sources();
        assert!(!sources.is_empty(), "driver '{}': default sources", case.name);
        for declared in sources {
            assert!(declared.validate().is_ok(), "driver '{}': source valid", case.name);
            assert_eq!(declared.driver(), id, "driver '{}': source driver", case.name);
        }
        assert!(
            case.driver.default_dialect().is_some_and(|dialect| !dialect.is_empty()),
            "driver '{}': dialect",
            case.name
        );
    }
}

#[test]
fn default_sources_serve_flows_and_structures() {
    let context = DriverContext::default();

    for case in driver_cases() {
        for declared in case.driver.default_sources() {
            let connection = case
                .driver
                .connect(&declared, &context)
                .unwrap_or_else(|error| panic!("driver '{}' connect failed: {error}", case.name));
            connection
                .test_connection()
                .unwrap_or_else(|error| panic!("driver '{}' test failed: {error}", case.name));

            let flows = connection.get_flows().expect("flows");
            assert!(!flows.is_empty(), "driver '{}': flows", case.name);
            for flow in flows {
                assert!(!flow.reference.is_empty(), "driver '{}': flow ref", case.name);
                let again = connection.get_flow(&flow.reference).expect("flow");
                assert_eq!(again, flow, "driver '{}': get_flow agrees", case.name);
                let structure = connection.get_structure(&flow.reference).expect("structure");
                assert_eq!(
                    structure.reference, flow.structure,
                    "driver '{}': structure ref",
                    case.name
                );
            }
        }
    }
}

#[test]
fn data_queries_honour_key_and_detail() {
    let context = DriverContext::default();
    let ecb = source("ECB", "D");

    for case in driver_cases() {
        let connection = case.driver.connect(&ecb, &context).expect("connection");
        let flows = connection.get_flows().expect("flows");
        let flow = &flows[0];

        let keys_only = connection
            .get_data(
                &flow.reference,
                &DataQuery::new(Key::parse(".USD"), DataDetail::SeriesKeysOnly),
            )
            .expect("data");
        assert_eq!(keys_only.data.len(), 2, "driver '{}': selected series", case.name);
        assert!(
            keys_only
                .data
                .iter()
                .all(|series| series.obs.is_empty() && series.meta.is_empty()),
            "driver '{}': detail applied",
            case.name
        );

        let invalid = connection
            .get_data(
                &flow.reference,
                &DataQuery::new(Key::parse("X.USD"), DataDetail::Full),
            )
            .expect_err("invalid code");
        assert_eq!(
            invalid.kind(),
            SourceErrorKind::InvalidRequest,
            "driver '{}': invalid key",
            case.name
        );
    }
}

#[test]
fn close_is_repeatable() {
    let context = DriverContext::default();

    for case in driver_cases() {
        let mut connection = case
            .driver
            .connect(&source("ECB", "D"), &context)
            .expect("connection");
        assert!(connection.close().is_ok(), "driver '{}': first close", case.name);
        assert!(connection.close().is_ok(), "driver '{}': second close", case.name);
    }
}

#[test]
fn mem_driver_rejects_sources_of_other_drivers() {
    let error = MemDriver::new("D")
        .connect(&source("ECB", "OTHER"), &DriverContext::default())
        .err()
        .expect("foreign source");

    assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
}
