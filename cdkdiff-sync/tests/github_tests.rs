//! `GithubComments` against a local HTTP responder.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use cdkdiff_sync::writer::marker_comment;
use cdkdiff_sync::{CommentError, CommentHandle, CommentStore, GithubComments, PullRequestRef};

/// One canned response: status, extra headers, JSON body.
struct Reply {
    status: u16,
    headers: Vec<String>,
    body: String,
}

fn reply(status: u16, body: &str) -> Reply {
    Reply {
        status,
        headers: vec![],
        body: body.to_string(),
    }
}

/// Serves `replies` in order, one connection each. Returns the base URL and a
/// handle yielding every request as `"METHOD /path\n<lowercased headers>\n<body>"`.
fn serve(build: impl FnOnce(&str) -> Vec<Reply>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let replies = build(&base);

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for reply in replies {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));

            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("request line");
            let mut headers = String::new();
            let mut length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("header");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(v) = lower.strip_prefix("content-length:") {
                    length = v.trim().parse().expect("content length");
                }
                headers.push_str(&lower);
            }
            let mut body = vec![0u8; length];
            reader.read_exact(&mut body).expect("body");

            let parts: Vec<&str> = request_line.split_whitespace().collect();
            seen.push(format!(
                "{} {}\n{}\n{}",
                parts[0],
                parts[1],
                headers,
                String::from_utf8_lossy(&body)
            ));

            let mut stream = stream;
            let mut response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                reply.status,
                reply.body.len()
            );
            for h in &reply.headers {
                response.push_str(h);
                response.push_str("\r\n");
            }
            response.push_str("\r\n");
            response.push_str(&reply.body);
            stream.write_all(response.as_bytes()).expect("write");
            stream.flush().expect("flush");
        }
        seen
    });
    (base, handle)
}

fn store(base: &str) -> GithubComments {
    let pr = PullRequestRef::parse("acme/infra", 7).expect("pr");
    GithubComments::new(base, "t0ken", pr)
}

#[test]
fn existing_comment_is_found_on_a_later_page_and_updated() {
    let key = "abc123";
    let (base, server) = serve(|base| {
        vec![
            Reply {
                status: 200,
                headers: vec![format!(
                    "Link: <{base}/repos/acme/infra/issues/7/comments?per_page=100&page=2>; rel=\"next\""
                )],
                body: r#"[{"id": 1, "body": "LGTM"}, {"id": 2, "body": null}]"#.to_string(),
            },
            reply(
                200,
                &serde_json::json!([{"id": 42, "body": format!("{}\nold", marker_comment(key))}])
                    .to_string(),
            ),
            reply(200, r#"{"id": 42, "body": "new"}"#),
        ]
    });

    let comments = store(&base);
    let found = comments.find_existing(key).expect("find");
    assert_eq!(found, Some(CommentHandle { id: 42 }));
    let updated = comments.update(CommentHandle { id: 42 }, "new body").expect("update");
    assert_eq!(updated.id, 42);

    let requests = server.join().expect("server");
    assert!(requests[0].starts_with("GET /repos/acme/infra/issues/7/comments?per_page=100\n"));
    assert!(requests[0].contains("authorization: bearer t0ken"));
    assert!(requests[1].starts_with("GET /repos/acme/infra/issues/7/comments?per_page=100&page=2\n"));
    assert!(requests[2].starts_with("PATCH /repos/acme/infra/issues/comments/42\n"));
    assert!(requests[2].ends_with(r#"{"body":"new body"}"#));
}

#[test]
fn missing_comment_is_created() {
    let (base, server) = serve(|_| {
        vec![
            reply(200, r#"[{"id": 1, "body": "unrelated"}]"#),
            reply(201, r#"{"id": 99}"#),
        ]
    });

    let comments = store(&base);
    assert_eq!(comments.find_existing("abc123").expect("find"), None);
    let created = comments.create("hello").expect("create");
    assert_eq!(created.id, 99);

    let requests = server.join().expect("server");
    assert!(requests[1].starts_with("POST /repos/acme/infra/issues/7/comments\n"));
}

#[test]
fn http_failures_carry_status_and_body() {
    let (base, server) = serve(|_| {
        vec![reply(
            403,
            r#"{"message": "Resource not accessible by integration"}"#,
        )]
    });

    let err = store(&base).create("hello").unwrap_err();
    match err {
        CommentError::Http { method, status, body, .. } => {
            assert_eq!(method, "POST");
            assert_eq!(status, 403);
            assert!(body.contains("Resource not accessible"));
        }
        other => panic!("expected HTTP error, got {other}"),
    }
    server.join().expect("server");
}
