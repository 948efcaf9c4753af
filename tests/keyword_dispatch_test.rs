//! Keyword dispatch tests that need no database.

use postgres_keywords::keywords::{KeywordCall, KeywordStatus, PostgresKeywords};
use postgres_keywords::transport::stdio::serve_lines;
use serde_json::{Value as JsonValue, json};
use tempfile::TempDir;

#[tokio::test]
async fn test_all_keywords_are_described() {
    let lib = PostgresKeywords::default();
    let names = lib.keyword_names();
    assert_eq!(names.len(), 13);
    for name in names {
        let description = lib.keyword_description(name).unwrap();
        assert_eq!(description.name, name);
        assert!(!description.doc.is_empty(), "{name} has no documentation");
    }
}

#[tokio::test]
async fn test_keyword_names_match_loosely() {
    let lib = PostgresKeywords::default();
    for spelling in [
        "Get Postgresql Connections",
        "get_postgresql_connections",
        "GETPOSTGRESQLCONNECTIONS",
        "  get postgresql   connections ",
    ] {
        let result = lib.run_keyword(KeywordCall::new(spelling)).await;
        assert!(result.is_pass(), "{spelling} did not resolve");
    }
}

#[tokio::test]
async fn test_argument_binding_errors() {
    let lib = PostgresKeywords::default();

    let cases = [
        // missing required argument
        KeywordCall::new("Switch Postgresql Connection"),
        // too many positional arguments
        KeywordCall::new("Commit Postgresql Transaction")
            .arg("a")
            .arg("b"),
        // unknown named argument on a keyword without free-form kwargs
        KeywordCall::new("Rollback Postgresql Transaction").kwarg("colour", "red"),
        // non-boolean autocommit
        KeywordCall::new("Set Postgresql Autocommit").arg(json!([1])),
    ];

    for call in cases {
        let keyword = call.keyword.clone();
        let result = lib.run_keyword(call).await;
        assert_eq!(result.status, KeywordStatus::Fail, "{keyword}");
        assert_eq!(result.error_type.as_deref(), Some("InvalidInput"), "{keyword}");
    }
}

#[tokio::test]
async fn test_connection_targets_without_connections() {
    let lib = PostgresKeywords::default();

    let result = lib
        .run_keyword(
            KeywordCall::new("Execute Sql String")
                .arg("SELECT 1")
                .kwarg("alias", "reporting"),
        )
        .await;
    assert_eq!(result.error_type.as_deref(), Some("ConnectionNotFound"));

    let result = lib
        .run_keyword(KeywordCall::new("Disconnect From Postgresql"))
        .await;
    assert_eq!(result.error_type.as_deref(), Some("NoActiveConnection"));
}

#[tokio::test]
async fn test_script_missing_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("teardown.sql");

    let lib = PostgresKeywords::default();
    let result = lib
        .run_keyword(KeywordCall::new("Execute Plpgsql Script").arg(missing.to_str().unwrap()))
        .await;
    assert_eq!(result.error_type.as_deref(), Some("IoError"));
    assert!(result.error.unwrap().contains("teardown.sql"));
}

#[tokio::test]
async fn test_connect_failure_is_connection_error() {
    let lib = PostgresKeywords::default();
    // Port 1 is never a PostgreSQL server
    let result = lib
        .run_keyword(
            KeywordCall::new("Connect To Postgresql")
                .arg("app")
                .arg("tester")
                .arg("secret")
                .arg("127.0.0.1")
                .arg(1),
        )
        .await;
    assert!(!result.is_pass());
    assert_eq!(result.error_type.as_deref(), Some("ConnectionError"));
    assert!(!result.error.unwrap_or_default().contains("secret"));
    assert!(lib.connections().await.is_empty());
}

#[tokio::test]
async fn test_stdio_session() {
    let lib = PostgresKeywords::default();
    let input = [
        json!({"method": "get_keyword_documentation", "name": "Execute Sql String"}),
        json!({"method": "run_keyword", "keyword": "Set Postgresql Autocommit", "args": [true]}),
    ]
    .iter()
    .map(|v| v.to_string() + "\n")
    .collect::<String>();

    let mut output = Vec::new();
    let handled = serve_lines(&lib, input.as_bytes(), &mut output)
        .await
        .unwrap();
    assert_eq!(handled, 2);

    let responses: Vec<JsonValue> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(responses[0]["status"], "PASS");
    assert_eq!(responses[0]["return"]["args"][0], "plpgsqlstatement");
    assert_eq!(responses[1]["error_type"], "NoActiveConnection");
}
