#![deny(warnings)]

use serde_json::{Value, json};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_confined-fileio-mcp");

struct McpStdioClient {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<std::process::ChildStdout>,
    next_id: u64,
}

impl McpStdioClient {
    fn start(root: &Path, extra_args: &[&str]) -> Self {
        let mut child = Command::new(BIN)
            .arg("serve")
            .arg("--root")
            .arg(root)
            .args(extra_args)
            .env_remove("FILEIO_ALLOWED_ROOT")
            .env("RUST_LOG", "warn")
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("spawn confined-fileio-mcp serve");

        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");

        Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
        }
    }

    fn send(&mut self, obj: &Value) {
        let mut line = serde_json::to_vec(obj).expect("serialize jsonrpc");
        line.push(b'\n');
        self.send_raw(&line);
    }

    fn send_raw(&mut self, bytes: &[u8]) {
        self.stdin
            .write_all(bytes)
            .and_then(|_| self.stdin.flush())
            .expect("write to server stdin");
    }

    fn read_msg(&mut self) -> Value {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.stdout.read_line(&mut line).expect("read line");
            if n == 0 {
                panic!("mcp server closed stdout");
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
                return v;
            }
        }
    }

    /// Read one `Content-Length` framed reply.
    fn read_framed(&mut self) -> Value {
        let mut length = None;
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line).expect("read header") == 0 {
                panic!("mcp server closed stdout");
            }
            let header = line.trim();
            if header.is_empty() {
                if length.is_some() {
                    break;
                }
                continue;
            }
            if let Some((name, value)) = header.split_once(':')
                && name.eq_ignore_ascii_case("content-length")
            {
                length = value.trim().parse::<usize>().ok();
            }
        }

        let mut body = vec![0u8; length.expect("content-length header")];
        self.stdout.read_exact(&mut body).expect("read body");
        serde_json::from_slice(&body).expect("reply body is json")
    }

    fn call(&mut self, method: &str, params: Value) -> Result<Value, Value> {
        let id = self.next_id;
        self.next_id += 1;

        self.send(&json!({"jsonrpc":"2.0","id":id,"method":method,"params":params}));

        loop {
            let msg = self.read_msg();
            if msg.get("id").and_then(|v| v.as_u64()) != Some(id) {
                continue;
            }
            if let Some(err) = msg.get("error") {
                return Err(err.clone());
            }
            return Ok(msg);
        }
    }

    fn notify(&mut self, method: &str, params: Value) {
        self.send(&json!({"jsonrpc":"2.0","method":method,"params":params}));
    }

    fn initialize(&mut self) {
        self.call(
            "initialize",
            json!({"protocolVersion":"2025-11-25","capabilities":{}}),
        )
        .expect("initialize");
        self.notify("notifications/initialized", json!({}));
    }

    fn tool_call(&mut self, name: &str, arguments: Value) -> Result<Value, Value> {
        let resp = self.call("tools/call", json!({"name":name,"arguments":arguments}))?;
        Ok(resp.get("result").cloned().expect("missing result field"))
    }
}

impl Drop for McpStdioClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn is_error(tool_result: &Value) -> bool {
    tool_result.get("isError").and_then(|v| v.as_bool()) == Some(true)
}

fn texts(tool_result: &Value) -> Vec<String> {
    tool_result
        .get("content")
        .and_then(|v| v.as_array())
        .unwrap_or_else(|| panic!("expected result.content array, got: {tool_result}"))
        .iter()
        .filter_map(|e| e.get("text").and_then(|t| t.as_str()).map(str::to_string))
        .collect()
}

/// Runs `f` against a server whose allowed root is `<tmp>/root`; the temp
/// dir's other children are outside the root.
fn run_case(f: impl FnOnce(&mut McpStdioClient, &Path, &TempDir)) {
    run_case_with_args(&[], f)
}

fn run_case_with_args(args: &[&str], f: impl FnOnce(&mut McpStdioClient, &Path, &TempDir)) {
    let test_root = TempDir::new().expect("create temp root");
    let allowed: PathBuf = test_root.path().join("root");
    fs::create_dir_all(&allowed).expect("create allowed root");

    let mut client = McpStdioClient::start(&allowed, args);
    client.initialize();
    f(&mut client, &allowed, &test_root);
}

#[test]
fn tools_list_exposes_three_tools() {
    run_case(|client, _, _| {
        let resp = client.call("tools/list", json!({})).unwrap();
        let names: Vec<&str> = resp["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["read_file", "write_file", "list_directory"]);
    });
}

#[test]
fn write_then_read_round_trip() {
    run_case(|client, root, _| {
        let content = "first line\n\tindented \"quoted\"\nlast line without newline";

        let res = client
            .tool_call("write_file", json!({"path": "notes.txt", "content": content}))
            .unwrap();
        assert!(!is_error(&res), "{res}");
        assert_eq!(texts(&res), vec!["Successfully wrote to notes.txt"]);
        assert_eq!(fs::read_to_string(root.join("notes.txt")).unwrap(), content);

        let res = client
            .tool_call("read_file", json!({"path": "notes.txt"}))
            .unwrap();
        assert!(!is_error(&res), "{res}");
        assert_eq!(texts(&res), vec!["File: notes.txt".to_string(), content.to_string()]);
    });
}

#[test]
fn write_twice_overwrites() {
    run_case(|client, root, _| {
        let path = root.join("same.txt");
        let abs = path.to_string_lossy();
        for _ in 0..2 {
            let res = client
                .tool_call("write_file", json!({"path": abs, "content": "once"}))
                .unwrap();
            assert!(!is_error(&res), "{res}");
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "once");
    });
}

#[test]
fn write_creates_missing_directories() {
    run_case(|client, root, _| {
        let res = client
            .tool_call("write_file", json!({"path": "sub/dir/file.txt", "content": "c"}))
            .unwrap();
        assert!(!is_error(&res), "{res}");
        assert!(root.join("sub/dir").is_dir());

        let res = client
            .tool_call("list_directory", json!({"path": "sub/dir"}))
            .unwrap();
        assert!(!is_error(&res), "{res}");
        assert_eq!(texts(&res), vec!["[FILE] file.txt"]);

        let res = client
            .tool_call("list_directory", json!({"path": "sub"}))
            .unwrap();
        assert_eq!(texts(&res), vec!["[DIR] dir"]);
    });
}

#[test]
fn list_without_path_lists_root() {
    run_case(|client, root, _| {
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::create_dir(root.join("b")).unwrap();

        let default = client.tool_call("list_directory", json!({})).unwrap();
        let dot = client
            .tool_call("list_directory", json!({"path": "."}))
            .unwrap();

        let sorted = |v: &Value| {
            let mut lines: Vec<String> = texts(v)[0].lines().map(str::to_string).collect();
            lines.sort();
            lines
        };
        assert_eq!(sorted(&default), vec!["[DIR] b", "[FILE] a.txt"]);
        assert_eq!(sorted(&default), sorted(&dot));
    });
}

#[test]
fn read_missing_file_is_flagged_failure() {
    run_case(|client, _, _| {
        let res = client
            .tool_call("read_file", json!({"path": "nope/missing.txt"}))
            .unwrap();
        assert!(is_error(&res), "{res}");
        let out = texts(&res);
        let text = &out[0];
        assert!(text.starts_with("Error:"), "{text}");
        assert!(text.contains("nope/missing.txt"), "{text}");
    });
}

#[test]
fn prefix_collision_is_denied() {
    run_case(|client, root, tmp| {
        let evil_dir = tmp.path().join("root-evil");
        let evil = evil_dir.join("x.txt");

        let res = client
            .tool_call(
                "write_file",
                json!({"path": evil.to_string_lossy(), "content": "pwned"}),
            )
            .unwrap();
        assert!(is_error(&res), "{res}");
        let out = texts(&res);
        let text = &out[0];
        assert!(text.contains("Access denied"), "{text}");
        assert!(text.contains(&*evil.to_string_lossy()), "{text}");
        assert!(!evil_dir.exists());

        let inside = root.join("x.txt");
        let res = client
            .tool_call(
                "write_file",
                json!({"path": inside.to_string_lossy(), "content": "ok"}),
            )
            .unwrap();
        assert!(!is_error(&res), "{res}");
    });
}

#[test]
fn traversal_is_denied() {
    run_case(|client, root, tmp| {
        fs::write(tmp.path().join("secret.txt"), "secret").unwrap();

        let via_root = format!("{}/../secret.txt", root.display());
        for path in ["../secret.txt", via_root.as_str(), "a/../../secret.txt"] {
            let res = client
                .tool_call("read_file", json!({"path": path}))
                .unwrap();
            assert!(is_error(&res), "{path}: {res}");
            let out = texts(&res);
            assert!(out[0].contains("Access denied"), "{}", out[0]);
            assert!(!out.iter().any(|t| t == "secret"));
        }

        let res = client
            .tool_call("list_directory", json!({"path": ".."}))
            .unwrap();
        assert!(is_error(&res), "{res}");

        let res = client
            .tool_call("write_file", json!({"path": "../out/x.txt", "content": "x"}))
            .unwrap();
        assert!(is_error(&res), "{res}");
        assert!(!tmp.path().join("out").exists());
    });
}

#[test]
fn bad_arguments_are_jsonrpc_errors() {
    run_case(|client, _, _| {
        let err = client
            .tool_call("write_file", json!({"path": "x.txt"}))
            .unwrap_err();
        assert_eq!(err["code"], -32602);
        assert!(err["message"].as_str().unwrap().contains("content"));

        let err = client.tool_call("delete_file", json!({})).unwrap_err();
        assert!(err["message"].as_str().unwrap().contains("delete_file"));

        let err = client.call("tools/call", json!({"arguments": {}})).unwrap_err();
        assert_eq!(err["code"], -32602);

        let err = client.call("resources/list", json!({})).unwrap_err();
        assert_eq!(err["code"], -32601);
    });
}

#[test]
fn ping_answers_empty_object() {
    run_case(|client, _, _| {
        let resp = client.call("ping", json!({})).unwrap();
        assert_eq!(resp["result"], json!({}));
    });
}

#[test]
fn notifications_are_never_answered() {
    run_case(|client, _, _| {
        client.notify("notifications/cancelled", json!({"requestId": 1}));
        client.notify("bogus/method", json!({}));
        client.send(&json!({"jsonrpc": "1.0", "method": "ping"}));
        client.send(&json!({"jsonrpc": "2.0", "id": 900, "method": "ping"}));

        // the very next frame must be the ping reply
        let msg = client.read_msg();
        assert_eq!(msg["id"], 900, "{msg}");
        assert_eq!(msg["result"], json!({}));
    });
}

#[test]
fn notifications_before_initialize_are_not_answered() {
    let tmp = TempDir::new().unwrap();
    let mut client = McpStdioClient::start(tmp.path(), &[]);
    client.notify("tools/list", json!({}));
    client.send(&json!({"jsonrpc": "2.0", "id": 901, "method": "ping"}));

    let msg = client.read_msg();
    assert_eq!(msg["id"], 901, "{msg}");
}

#[test]
fn malformed_lines_get_parse_errors_and_server_keeps_going() {
    run_case(|client, _, _| {
        client.send_raw(b"\xff\xfe\n");
        let msg = client.read_msg();
        assert_eq!(msg["error"]["code"], -32700, "{msg}");
        assert_eq!(msg["id"], Value::Null);

        client.send_raw(b"{not json\n");
        let msg = client.read_msg();
        assert_eq!(msg["error"]["code"], -32700, "{msg}");

        let resp = client.call("ping", json!({})).unwrap();
        assert_eq!(resp["result"], json!({}));
    });
}

#[test]
fn malformed_content_length_frames_do_not_stop_server() {
    let tmp = TempDir::new().unwrap();
    let mut client = McpStdioClient::start(tmp.path(), &[]);

    let ping = |id: u64| {
        let body = json!({"jsonrpc": "2.0", "id": id, "method": "ping"}).to_string();
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    };

    client.send_raw(&ping(1));
    assert_eq!(client.read_framed()["id"], 1);

    client.send_raw(b"Content-Length: 2\r\n\r\n\xff\xfe");
    let msg = client.read_framed();
    assert_eq!(msg["error"]["code"], -32700, "{msg}");

    client.send_raw(&ping(2));
    assert_eq!(client.read_framed()["id"], 2);
}

#[test]
fn requests_before_initialize_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut client = McpStdioClient::start(tmp.path(), &[]);
    let err = client.call("tools/list", json!({})).unwrap_err();
    assert_eq!(err["code"], -32000);
}

#[cfg(unix)]
#[test]
fn symlink_escape_denied_with_resolution() {
    run_case_with_args(&["--resolve-symlinks"], |client, root, tmp| {
        let outside = tmp.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let res = client
            .tool_call("read_file", json!({"path": "link/secret.txt"}))
            .unwrap();
        assert!(is_error(&res), "{res}");
        assert!(texts(&res)[0].contains("Access denied"));

        let res = client
            .tool_call("write_file", json!({"path": "real/file.txt", "content": "ok"}))
            .unwrap();
        assert!(!is_error(&res), "{res}");
    });
}

#[test]
fn missing_root_fails_fast() {
    let status = Command::new(BIN)
        .arg("serve")
        .env_remove("FILEIO_ALLOWED_ROOT")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run confined-fileio-mcp");
    assert!(!status.success());

    let status = Command::new(BIN)
        .args(["serve", "--root", ""])
        .env_remove("FILEIO_ALLOWED_ROOT")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run confined-fileio-mcp");
    assert!(!status.success());
}

#[test]
fn root_from_environment() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("env.txt"), "from env").unwrap();

    let mut child = Command::new(BIN)
        .arg("serve")
        .env("FILEIO_ALLOWED_ROOT", tmp.path())
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("spawn confined-fileio-mcp");
    let stdin = child.stdin.take().unwrap();
    let stdout = child.stdout.take().unwrap();
    let mut client = McpStdioClient {
        child,
        stdin,
        stdout: BufReader::new(stdout),
        next_id: 1,
    };
    client.initialize();

    let res = client
        .tool_call("read_file", json!({"path": "env.txt"}))
        .unwrap();
    assert_eq!(texts(&res)[1], "from env");
}
