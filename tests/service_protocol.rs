use jsbox::pipeline::{Pipeline, PipelineConfig};
use jsbox::sandbox::ExecutionLimits;
use jsbox::service::{MAX_REQUEST_BYTES, Service, serve_tcp};
use serde_json::{Value, json};
use std::io::Cursor;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

fn service() -> Service {
    let config = PipelineConfig {
        limits: ExecutionLimits::with_timeout(Duration::from_millis(300)),
        include_ast: false,
        ..PipelineConfig::default()
    };
    Service::new(Pipeline::new(config))
}

fn run_lines(input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    service().handle(Cursor::new(input), &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn one_response_per_request_in_order() {
    let input = [
        json!({"id": 1, "code": "print('one')"}),
        json!({"id": 2, "code": ""}),
        json!({"id": 3, "code": "let = ;"}),
        json!({"id": 4, "code": "while (true) {}"}),
    ]
    .iter()
    .map(Value::to_string)
    .collect::<Vec<_>>()
    .join("\n\n");

    let responses = run_lines(&input);
    assert_eq!(responses.len(), 4);
    let ids: Vec<_> = responses.iter().map(|response| response["id"].clone()).collect();
    assert_eq!(ids, [json!(1), json!(2), json!(3), json!(4)]);

    assert_eq!(responses[0]["result"]["logs"], json!(["one"]));
    assert_eq!(responses[1]["message"], "No code provided");
    assert!(responses[2]["message"].as_str().unwrap().starts_with("Parsing error"));
    assert_eq!(responses[3]["success"], true);
    assert_eq!(responses[3]["result"]["executionSuccess"], false);
    assert!(responses[3]["result"]["error"].as_str().unwrap().contains("timed out"));
}

#[test]
fn bad_lines_do_not_end_the_session() {
    let responses = run_lines("{\"code\": 5}\nnot json\n{\"code\": \"print(2)\"}\n");
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["message"], "Invalid request");
    assert_eq!(responses[1]["message"], "Invalid request");
    assert_eq!(responses[2]["result"]["logs"], json!(["2"]));
}

#[tokio::test]
async fn tcp_connections_are_served() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_tcp(service(), listener));

    let stream = TcpStream::connect(address).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    writer
        .write_all(b"{\"id\": \"x\", \"code\": \"console.log([1, 2].map(n => n * 10))\"}\n")
        .await
        .unwrap();
    let mut lines = BufReader::new(reader).lines();
    let line = lines.next_line().await.unwrap().unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["id"], "x");
    assert_eq!(response["result"]["logs"], json!(["[10,20]"]));

    server.abort();
}

#[test]
fn oversized_lines_are_rejected_and_skipped() {
    let long = format!("{{\"id\": 1, \"code\": \"{}\"}}", "x".repeat(MAX_REQUEST_BYTES));
    let input = format!("{long}\n{{\"id\": 2, \"code\": \"print(2)\"}}\n{long}");
    let responses = run_lines(&input);
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["message"], "Invalid request");
    assert!(responses[0]["error"].as_str().unwrap().contains("exceeds"));
    assert!(responses[0].get("id").is_none());
    assert_eq!(responses[1]["id"], 2);
    assert_eq!(responses[1]["result"]["logs"], json!(["2"]));
    assert_eq!(responses[2]["message"], "Invalid request");
}

#[tokio::test]
async fn tcp_oversized_lines_keep_the_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_tcp(service(), listener));

    let stream = TcpStream::connect(address).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut request = vec![b'x'; MAX_REQUEST_BYTES + 10];
    request.extend_from_slice(b"\n{\"id\": 3, \"code\": \"print(3)\"}\n");
    let sender = tokio::spawn(async move {
        writer.write_all(&request).await.unwrap();
        writer
    });

    let mut lines = BufReader::new(reader).lines();
    let first: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(first["message"], "Invalid request");
    let second: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(second["id"], 3);
    assert_eq!(second["result"]["logs"], json!(["3"]));

    drop(sender.await.unwrap());
    server.abort();
}
