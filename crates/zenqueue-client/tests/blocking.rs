use std::net::SocketAddr;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use zenqueue_client::blocking::QueueClient;
use zenqueue_client::ClientError;

/// One step of a scripted server: read a request line, then react.
enum Script {
	/// Reply with the given line.
	Respond(&'static str),
	/// Sleep, then reply.
	DelayedRespond(u64, &'static str),
	/// Consume the line without replying (e.g. quit).
	ReadOnly,
}

/// Serves exactly one connection according to `script` on its own runtime
/// thread and returns the request lines it received.
fn mock_server(script: Vec<Script>) -> (SocketAddr, thread::JoinHandle<Vec<String>>) {
	let (addr_tx, addr_rx) = mpsc::channel();

	let handle = thread::spawn(move || {
		let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
		runtime.block_on(async move {
			let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
			addr_tx.send(listener.local_addr().unwrap()).unwrap();

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
		})
	});

	(addr_rx.recv().unwrap(), handle)
}

#[test]
fn test_blocking_round_trip() {
	let (addr, server) = mock_server(vec![
		Script::Respond(r#"["success", null]"#),
		Script::Respond(r#"["success", "hello"]"#),
		Script::ReadOnly,
	]);
	let client = QueueClient::connect(addr).unwrap();

	client.push(json!("hello")).unwrap();
	assert_eq!(client.pull(Some(Duration::from_secs(1))).unwrap(), json!("hello"));
	client.close().unwrap();

	let received = server.join().unwrap();
	assert_eq!(received.len(), 3);
	let quit: Value = serde_json::from_str(&received[2]).unwrap();
	assert_eq!(quit[0], json!("quit"));
}

#[test]
fn test_threads_share_one_blocking_client() {
	let (addr, server) = mock_server(vec![
		Script::DelayedRespond(100, r#"["success", "first"]"#),
		Script::Respond(r#"["success", null]"#),
	]);
	let client = Arc::new(QueueClient::connect(addr).unwrap());

	let puller = {
		let client = client.clone();
		thread::spawn(move || client.pull(None).unwrap())
	};
	thread::sleep(Duration::from_millis(20));
	let pusher = {
		let client = client.clone();
		thread::spawn(move || client.push(json!("x")).unwrap())
	};

	assert_eq!(puller.join().unwrap(), json!("first"));
	pusher.join().unwrap();
	drop(client);

	let received = server.join().unwrap();
	assert_eq!(received.len(), 2);
}

#[test]
fn test_queued_thread_times_out_during_anothers_pull() {
	let (addr, server) = mock_server(vec![Script::DelayedRespond(400, r#"["success", "slow"]"#)]);
	let client = Arc::new(QueueClient::connect(addr).unwrap());

	let slow = {
		let client = client.clone();
		thread::spawn(move || client.pull(None).unwrap())
	};
	thread::sleep(Duration::from_millis(50));

	// The wire is busy with the slow pull; this thread's call gives up
	// while still queued, well before the slow response arrives.
	let started = Instant::now();
	let queued = client.pull(Some(Duration::from_millis(50)));
	assert!(matches!(queued, Err(ClientError::Timeout)));
	assert!(started.elapsed() < Duration::from_millis(300));

	assert_eq!(slow.join().unwrap(), json!("slow"));
	drop(client);

	// The abandoned request never touched the socket.
	let received = server.join().unwrap();
	assert_eq!(received.len(), 1);
}
