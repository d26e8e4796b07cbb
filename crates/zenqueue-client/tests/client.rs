use std::net::SocketAddr;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use zenqueue_client::{ClientError, QueueClient};

/// One step of a scripted server: read a request line, then react.
enum Script {
	/// Reply with the given line.
	Respond(&'static str),
	/// Sleep, then reply.
	DelayedRespond(u64, &'static str),
	/// Consume the line without replying (e.g. quit).
	ReadOnly,
}

/// Serves exactly one connection according to `script` and returns the
/// request lines it received.
async fn mock_server(script: Vec<Script>) -> (SocketAddr, JoinHandle<Vec<String>>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let handle = tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let mut reader = BufReader::new(stream);
		let mut received = Vec::new();

		for step in script {
			let mut line = String::new();
			if reader.read_line(&mut line).await.unwrap() == 0 {
				break;
			}
			received.push(line.trim_end().to_string());

			match step {
				Script::Respond(reply) => {
					reader.get_mut().write_all(format!("{reply}\r\n").as_bytes()).await.unwrap();
				}
				Script::DelayedRespond(millis, reply) => {
					tokio::time::sleep(Duration::from_millis(millis)).await;
					reader.get_mut().write_all(format!("{reply}\r\n").as_bytes()).await.unwrap();
				}
				Script::ReadOnly => {}
			}
		}
		received
	});

	(addr, handle)
}

#[tokio::test]
async fn test_push_sends_frame_and_maps_success() {
	let (addr, server) = mock_server(vec![Script::Respond(r#"["success", null]"#)]).await;
	let client = QueueClient::connect(addr).await.unwrap();

	client.push(json!("hello")).await.unwrap();
	drop(client);

	let received = server.await.unwrap();
	let frame: Value = serde_json::from_str(&received[0]).unwrap();
	assert_eq!(frame, json!(["push", ["hello"], {}]));
}

#[tokio::test]
async fn test_pull_round_trip_decodes_payload() {
	let (addr, server) = mock_server(vec![Script::Respond(r#"["success", "hello"]"#)]).await;
	let client = QueueClient::connect(addr).await.unwrap();

	let value = client.pull(Some(Duration::from_secs(1))).await.unwrap();
	assert_eq!(value, json!("hello"));
	drop(client);

	let received = server.await.unwrap();
	let frame: Value = serde_json::from_str(&received[0]).unwrap();
	assert_eq!(frame[0], json!("pull"));
	assert_eq!(frame[2], json!({ "timeout": 1.0 }));
}

#[tokio::test]
async fn test_pull_many_sends_count_and_decodes_array() {
	let (addr, server) = mock_server(vec![Script::Respond(r#"["success", ["a", "b"]]"#)]).await;
	let client = QueueClient::connect(addr).await.unwrap();

	let values = client.pull_many(Some(5), Some(Duration::from_millis(500))).await.unwrap();
	assert_eq!(values, vec![json!("a"), json!("b")]);
	drop(client);

	let received = server.await.unwrap();
	let frame: Value = serde_json::from_str(&received[0]).unwrap();
	assert_eq!(frame[0], json!("pull_many"));
	assert_eq!(frame[1], json!([5]));
	assert_eq!(frame[2], json!({ "timeout": 0.5 }));
}

#[tokio::test]
async fn test_status_errors_map_to_client_errors() {
	let (addr, _server) = mock_server(vec![
		Script::Respond(r#"["error:request", "malformed request"]"#),
		Script::Respond(r#"["error:action", "bad argument"]"#),
		Script::Respond(r#"["error:timeout", null]"#),
	])
	.await;
	let client = QueueClient::connect(addr).await.unwrap();

	let request_err = client.push(json!(1)).await.unwrap_err();
	assert!(matches!(request_err, ClientError::Request(ref msg) if msg == "malformed request"));

	let action_err = client.push(json!(2)).await.unwrap_err();
	assert!(matches!(action_err, ClientError::Action(ref msg) if msg == "bad argument"));

	// Non-fatal statuses leave the connection usable.
	let timeout_err = client.pull(None).await.unwrap_err();
	assert!(matches!(timeout_err, ClientError::Timeout));
}

#[tokio::test]
async fn test_unknown_error_closes_the_client() {
	let (addr, _server) = mock_server(vec![Script::Respond(r#"["error:unknown", "handler bug"]"#)]).await;
	let client = QueueClient::connect(addr).await.unwrap();

	let first = client.push(json!(1)).await.unwrap_err();
	assert!(matches!(first, ClientError::Unknown(_)));

	let second = client.push(json!(2)).await.unwrap_err();
	assert!(matches!(second, ClientError::Closed));
}

#[tokio::test]
async fn test_malformed_response_closes_the_client() {
	let (addr, _server) = mock_server(vec![Script::Respond("this is not json")]).await;
	let client = QueueClient::connect(addr).await.unwrap();

	let first = client.pull(None).await.unwrap_err();
	assert!(matches!(first, ClientError::Unknown(_)));

	let second = client.pull(None).await.unwrap_err();
	assert!(matches!(second, ClientError::Closed));
}

#[tokio::test]
async fn test_concurrent_callers_share_one_connection() {
	let (addr, server) = mock_server(vec![
		Script::DelayedRespond(10, r#"["success", null]"#),
		Script::DelayedRespond(10, r#"["success", null]"#),
		Script::DelayedRespond(10, r#"["success", null]"#),
		Script::DelayedRespond(10, r#"["success", null]"#),
	])
	.await;
	let client = QueueClient::connect(addr).await.unwrap();

	let (a, b, c, d) = tokio::join!(
		client.push(json!("a")),
		client.push(json!("b")),
		client.push(json!("c")),
		client.push(json!("d")),
	);
	a.unwrap();
	b.unwrap();
	c.unwrap();
	d.unwrap();
	drop(client);

	// Every frame must have reached the server whole: each received line
	// parses as one complete request.
	let received = server.await.unwrap();
	assert_eq!(received.len(), 4);
	for line in received {
		let frame: Value = serde_json::from_str(&line).unwrap();
		assert_eq!(frame[0], json!("push"));
	}
}

#[tokio::test]
async fn test_caller_timeout_while_queued_cancels_request() {
	let (addr, server) = mock_server(vec![Script::DelayedRespond(300, r#"["success", "slow"]"#)]).await;
	let client = QueueClient::connect(addr).await.unwrap();

	let slow = {
		let client = client.clone();
		tokio::spawn(async move { client.pull(None).await })
	};
	tokio::time::sleep(Duration::from_millis(20)).await;

	// This call waits behind the slow one and gives up before its turn.
	let started = Instant::now();
	let queued = client.pull(Some(Duration::from_millis(50))).await;
	assert!(matches!(queued, Err(ClientError::Timeout)));
	assert!(started.elapsed() < Duration::from_millis(250));

	assert_eq!(slow.await.unwrap().unwrap(), json!("slow"));
	drop(client);

	// The cancelled request never touched the socket.
	let received = server.await.unwrap();
	assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn test_close_sends_quit_and_is_idempotent() {
	let (addr, server) = mock_server(vec![Script::ReadOnly]).await;
	let client = QueueClient::connect(addr).await.unwrap();

	client.close().await.unwrap();
	client.close().await.unwrap();

	let push_after_close = client.push(json!(1)).await.unwrap_err();
	assert!(matches!(push_after_close, ClientError::Closed));

	let received = server.await.unwrap();
	let frame: Value = serde_json::from_str(&received[0]).unwrap();
	assert_eq!(frame[0], json!("quit"));
}
