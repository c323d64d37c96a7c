use anyhow::Result;
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use notion_rollup::utils::validation::Validate;
use notion_rollup::{NotionClient, RollupEngine, RollupError, RunConfig};
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(server: &MockServer, extra: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
target_props = ["price"]
{extra}

[notion]
token = "${{ROLLUP_IT_TOKEN}}"
database_id = "budget-db"
base_url = "{base}"
page_size = 50

[filter.all]
property = "Kind"
select = {{ equals = "Item" }}

[filter.target]
property = "Kind"
select = {{ equals = "Total" }}
"#,
        extra = extra,
        base = server.base_url()
    )?;
    Ok(file)
}

fn page(id: &str, properties: Value) -> Value {
    json!({ "object": "page", "id": id, "properties": properties })
}

fn load(file: &NamedTempFile) -> Result<RunConfig> {
    std::env::set_var("ROLLUP_IT_TOKEN", "secret_it");
    let config = RunConfig::from_file(file.path())?;
    config.validate()?;
    Ok(config)
}

#[tokio::test]
async fn test_sum_end_to_end_against_mock_notion() -> Result<()> {
    let server = MockServer::start();

    let source = server.mock(|when, then| {
        when.method(POST)
            .path("/databases/budget-db/query")
            .header("Authorization", "Bearer secret_it")
            .json_body(json!({
                "page_size": 50,
                "filter": {"property": "Kind", "select": {"equals": "Item"}}
            }));
        then.status(200).json_body(json!({
            "results": [
                page("a", json!({"price": {"type": "number", "number": 10}})),
                page("b", json!({"price": {"type": "number", "number": null}})),
                page("c", json!({"price": {"type": "number", "number": 5}}))
            ],
            "has_more": false,
            "next_cursor": null
        }));
    });
    let target = server.mock(|when, then| {
        when.method(POST)
            .path("/databases/budget-db/query")
            .json_body(json!({
                "page_size": 50,
                "filter": {"property": "Kind", "select": {"equals": "Total"}}
            }));
        then.status(200).json_body(json!({
            "results": [page("total", json!({}))],
            "has_more": false,
            "next_cursor": null
        }));
    });
    let update = server.mock(|when, then| {
        when.method(PATCH)
            .path("/pages/total")
            .json_body(json!({"properties": {"price": {"number": 15.0}}}));
        then.status(200).json_body(json!({"object": "page", "id": "total"}));
    });

    let file = write_config(&server, "")?;
    let config = load(&file)?;
    let client = NotionClient::new(&config.notion)?;
    let summary = RollupEngine::new(client, config).run().await?;

    source.assert();
    target.assert();
    update.assert();
    assert_eq!(summary.source_rows, 3);
    assert_eq!(summary.target_page_ids, vec!["total"]);
    Ok(())
}

#[tokio::test]
async fn test_research_preset_concatenates_authors() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST)
            .path("/databases/budget-db/query")
            .body_contains("\"Item\"");
        then.status(200).json_body(json!({
            "results": [
                page("a", json!({
                    "price": {"type": "number", "number": 1},
                    "authors": {"type": "rich_text", "rich_text": []}
                })),
                page("b", json!({
                    "price": {"type": "number", "number": 2},
                    "authors": {
                        "type": "select",
                        "select": {"id": "x", "name": "Lovelace", "color": "red"}
                    }
                }))
            ],
            "has_more": false,
            "next_cursor": null
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/databases/budget-db/query")
            .body_contains("\"Total\"");
        then.status(200).json_body(json!({
            "results": [page("t1", json!({})), page("t2", json!({}))],
            "has_more": false,
            "next_cursor": null
        }));
    });
    let expected = json!({
        "properties": {
            "authors": {"rich_text": [{"text": {"content": "{'id': 'x', 'name': 'Lovelace', 'color': 'red'}"}}]}
        }
    });
    let update = server.mock(|when, then| {
        when.method(PATCH).path_contains("/pages/").json_body(expected);
        then.status(200).json_body(json!({"object": "page"}));
    });

    let file = write_config(&server, "handler_type = \"research\"")?;
    let config = load(&file)?;
    let client = NotionClient::new(&config.notion)?;
    let summary = RollupEngine::new(client, config).run().await?;

    update.assert_hits(2);
    assert_eq!(summary.target_page_ids, vec!["t1", "t2"]);
    Ok(())
}

#[tokio::test]
async fn test_empty_target_aborts_before_any_update() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST)
            .path("/databases/budget-db/query")
            .body_contains("\"Item\"");
        then.status(200).json_body(json!({
            "results": [page("a", json!({"price": {"type": "number", "number": 3}}))],
            "has_more": false,
            "next_cursor": null
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/databases/budget-db/query")
            .body_contains("\"Total\"");
        then.status(200)
            .json_body(json!({"results": [], "has_more": false, "next_cursor": null}));
    });
    let update = server.mock(|when, then| {
        when.method(PATCH);
        then.status(200).json_body(json!({}));
    });

    let file = write_config(&server, "")?;
    let config = load(&file)?;
    let client = NotionClient::new(&config.notion)?;
    let err = RollupEngine::new(client, config).run().await.unwrap_err();

    assert!(matches!(err, RollupError::EmptyResultError { .. }));
    update.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_multi_processor_last_config_wins() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST)
            .path("/databases/budget-db/query")
            .body_contains("\"Item\"");
        then.status(200).json_body(json!({
            "results": [
                page("a", json!({"price": {"type": "number", "number": 4}})),
                page("b", json!({"price": {"type": "number", "number": 6}}))
            ],
            "has_more": false,
            "next_cursor": null
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/databases/budget-db/query")
            .body_contains("\"Total\"");
        then.status(200).json_body(json!({
            "results": [page("t1", json!({}))],
            "has_more": false,
            "next_cursor": null
        }));
    });
    let update = server.mock(|when, then| {
        when.method(PATCH)
            .path("/pages/t1")
            .json_body(json!({"properties": {"price": {"number": 2}}}));
        then.status(200).json_body(json!({"object": "page", "id": "t1"}));
    });

    let processors = r#"
[[processor_config]]
type = "sum"
properties = ["price"]

[[processor_config]]
type = "count"
properties = ["price"]
"#;
    let file = write_config(&server, processors)?;
    let config = load(&file)?;
    let client = NotionClient::new(&config.notion)?;
    RollupEngine::new(client, config).run().await?;

    update.assert();
    Ok(())
}

#[tokio::test]
async fn test_bogus_processor_makes_no_requests() -> Result<()> {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.any_request();
        then.status(200).json_body(json!({}));
    });

    let file = write_config(
        &server,
        "[processor_config]\ntype = \"bogus\"\nproperties = [\"price\"]",
    )?;
    std::env::set_var("ROLLUP_IT_TOKEN", "secret_it");
    let config = RunConfig::from_file(file.path())?;
    assert!(matches!(
        config.validate(),
        Err(RollupError::UnknownProcessorError { .. })
    ));

    let client = NotionClient::new(&config.notion)?;
    let err = RollupEngine::new(client, config).run().await.unwrap_err();

    assert!(matches!(err, RollupError::UnknownProcessorError { .. }));
    any.assert_hits(0);
    Ok(())
}
