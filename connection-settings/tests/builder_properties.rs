//! Properties of the connection string builders that callers rely on
//!
//! These tests verify that:
//! 1. Every flag combination survives a build → parse round trip
//! 2. Attach-file and catalog targets are mutually exclusive
//! 3. Entity connection strings always carry three metadata locators
//! 4. Connectivity failures are reported, never panicked on

use connection_settings::{
    ConnectionSetting, ConnectivityError, ConnectivityTestable, EntityConnectionSetting,
    SqlConnectionParameters, SqlConnectionSetting, SqlKeyword, SQL_CLIENT_PROVIDER,
};

const FLAG_STATES: [Option<bool>; 3] = [None, Some(true), Some(false)];

fn all_flag_combinations() -> Vec<(Option<bool>, Option<bool>, Option<bool>)> {
    let mut combos = Vec::new();
    for mars in FLAG_STATES {
        for integrated in FLAG_STATES {
            for persist in FLAG_STATES {
                combos.push((mars, integrated, persist));
            }
        }
    }
    combos
}

#[test]
fn test_round_trip_for_every_flag_combination() {
    for (server, database) in [("db01", "Sales"), ("(local)", r"C:\Data\Sales.mdf"), ("tcp:db,1433", "/data/x.MDF")] {
        for (mars, integrated, persist) in all_flag_combinations() {
            let parameters = SqlConnectionParameters {
                server: server.to_string(),
                database: database.to_string(),
                username: "app user".to_string(),
                password: "p@ss;word".to_string(),
                multiple_active_result_sets: mars,
                integrated_security: integrated,
                persist_security_info: persist,
                application_name: Some("Portal".to_string()),
            };

            let built = SqlConnectionSetting::new(&parameters);
            let parsed = SqlConnectionSetting::parse(built.connection_string())
                .expect("built connection strings always parse");
            let recovered = parsed.parameters().expect("flags are valid booleans");

            assert_eq!(recovered.server, parameters.server);
            assert_eq!(recovered.database, parameters.database);
            assert_eq!(recovered.username, parameters.username);
            assert_eq!(recovered.password, parameters.password);
            assert_eq!(recovered.multiple_active_result_sets, mars);
            assert_eq!(recovered.persist_security_info, persist);
            // Unset integrated security keeps the builder default of enabled
            assert_eq!(recovered.integrated_security, Some(integrated.unwrap_or(true)));
            assert_eq!(recovered.application_name, parameters.application_name);
        }
    }
}

#[test]
fn test_unset_flags_are_not_forced() {
    let built = SqlConnectionSetting::new(&SqlConnectionParameters::new("db01", "Sales"));
    let text = built.connection_string();
    assert!(text.contains("Integrated Security=True"));
    assert!(!text.contains("MultipleActiveResultSets"));
    assert!(!text.contains("Persist Security Info"));
}

#[test]
fn test_target_fields_are_exclusive() {
    let databases = [
        ("Sales", false),
        ("Sales.mdf", true),
        ("SALES.MDF", true),
        (r"App_Data\Sales", true),
        ("data/sales", true),
        ("Sales.mdfx", false),
    ];
    for (database, attach) in databases {
        let built = SqlConnectionSetting::new(&SqlConnectionParameters::new("db01", database));
        let builder = built.builder();
        assert_eq!(builder.contains(SqlKeyword::AttachDbFilename), attach, "{}", database);
        assert_eq!(builder.contains(SqlKeyword::InitialCatalog), !attach, "{}", database);
    }
}

#[test]
fn test_local_server_variants() {
    for server in ["", "(local)", "(LOCAL)", "  (local)  "] {
        let built = SqlConnectionSetting::new(&SqlConnectionParameters::new(server, "Sales"));
        assert!(built.connection_string().starts_with("Data Source=(local);"), "{:?}", server);
    }
    let built = SqlConnectionSetting::new(&SqlConnectionParameters::new("db01", "Sales"));
    assert!(built.connection_string().starts_with("Data Source=db01;"));
}

#[test]
fn test_entity_metadata_segments() {
    for model in ["Model", "NoDotsAtAll", "A.B.C", "with space"] {
        let entity = EntityConnectionSetting::new(
            model,
            SQL_CLIENT_PROVIDER,
            &SqlConnectionParameters::new("db01", "Sales"),
        );
        let segments: Vec<&str> = entity.metadata().split('|').collect();
        assert_eq!(segments.len(), 3);
        for (segment, ext) in segments.iter().zip([".csdl", ".ssdl", ".msl"]) {
            assert_eq!(*segment, format!("res://*/{}{}", model, ext));
        }
        let reparsed = EntityConnectionSetting::parse(entity.connection_string()).expect("entity string parses");
        assert_eq!(reparsed.model(), model);
    }
}

#[tokio::test]
async fn test_refused_connection_reports_failure() {
    let setting = ConnectionSetting::with_connection_string(
        SQL_CLIENT_PROVIDER,
        "Data Source=127.0.0.1,1;Initial Catalog=Sales;User ID=sa;Password=x;Connect Timeout=3",
    );

    let result = setting.check_connectivity().await;
    assert!(
        matches!(result, Err(ConnectivityError::Unreachable(_)) | Err(ConnectivityError::Timeout(_))),
        "unexpected result: {:?}",
        result
    );
    assert!(!setting.test().await);
}

#[tokio::test]
async fn test_entity_setting_tests_through_trait_object() {
    let entity = EntityConnectionSetting::new(
        "M",
        SQL_CLIENT_PROVIDER,
        &SqlConnectionParameters::new("127.0.0.1,1", "Sales").with_credentials("sa", "x"),
    );
    let as_base: ConnectionSetting = entity.clone().into();
    let testables: Vec<Box<dyn ConnectivityTestable>> = vec![Box::new(entity), Box::new(as_base)];
    for testable in testables {
        assert!(!testable.test().await);
    }
}
