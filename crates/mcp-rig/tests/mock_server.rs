//! Scriptable MCP server used by the test suites.
//!
//! Speaks newline-delimited JSON-RPC 2.0 on stdio. Flags select the
//! behaviors tests need:
//!
//!   --tools / --resources / --prompts   advertise those capabilities
//!   --garbage-first            print a non-JSON line before anything else
//!   --unsolicited-response     print a response nobody asked for at startup
//!   --stderr-noise             print two stderr lines at startup
//!   --exit-code N              exit with code N: immediately, or after the
//!                              first request with --exit-after-first-request
//!   --exit-after-first-request read one request, exit without responding
//!   --ignore-close             keep running after stdin closes
//!   --silent                   read requests but never respond
//!   --delay-ms N               delay every response by N milliseconds
//!   --both-result-and-error    responses carry both result and error
//!   --mismatched-id            respond with id + 1000
//!   --missing-jsonrpc          omit the jsonrpc version from responses
//!   --null-id                  respond with a null id
//!   --invalid-initialize       initialize result misses required fields
//!   --no-tool-list-entry       advertise tools but return an empty list
//!
//! Requests with an id are answered; messages without one are counted and
//! dropped. The `probe/*` methods expose internal counters so tests can
//! assert ordering and delivery without sleeping.

use std::io::{BufRead, Write};

use serde_json::{Value, json};

use mcp_rig_protocol::jsonrpc::JsonRpcError;
use mcp_rig_protocol::mcp::LATEST_PROTOCOL_VERSION;

#[derive(Default)]
struct Options {
    tools: bool,
    resources: bool,
    prompts: bool,
    garbage_first: bool,
    unsolicited_response: bool,
    stderr_noise: bool,
    exit_code: Option<i32>,
    exit_after_first_request: bool,
    ignore_close: bool,
    silent: bool,
    delay_ms: u64,
    both_result_and_error: bool,
    mismatched_id: bool,
    missing_jsonrpc: bool,
    null_id: bool,
    invalid_initialize: bool,
    no_tool_list_entry: bool,
}

fn parse_options() -> Options {
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tools" => options.tools = true,
            "--resources" => options.resources = true,
            "--prompts" => options.prompts = true,
            "--garbage-first" => options.garbage_first = true,
            "--unsolicited-response" => options.unsolicited_response = true,
            "--stderr-noise" => options.stderr_noise = true,
            "--exit-code" => {
                options.exit_code = args.next().and_then(|value| value.parse().ok());
            }
            "--exit-after-first-request" => options.exit_after_first_request = true,
            "--ignore-close" => options.ignore_close = true,
            "--silent" => options.silent = true,
            "--delay-ms" => {
                options.delay_ms = args
                    .next()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(0);
            }
            "--both-result-and-error" => options.both_result_and_error = true,
            "--mismatched-id" => options.mismatched_id = true,
            "--missing-jsonrpc" => options.missing_jsonrpc = true,
            "--null-id" => options.null_id = true,
            "--invalid-initialize" => options.invalid_initialize = true,
            "--no-tool-list-entry" => options.no_tool_list_entry = true,
            other => {
                eprintln!("mock-mcp-server: unknown flag {other}");
                std::process::exit(2);
            }
        }
    }
    options
}

#[derive(Default)]
struct Counters {
    tools_list: u64,
    resources_list: u64,
    prompts_list: u64,
    notifications: u64,
    seq: u64,
}

enum Reply {
    Result(Value),
    Error(i64, String),
}

fn main() -> std::io::Result<()> {
    let options = parse_options();
    let stdout = std::io::stdout();

    if options.stderr_noise {
        eprintln!("mock server starting up");
        eprintln!("listening on stdio");
    }
    if options.garbage_first {
        let mut out = stdout.lock();
        writeln!(out, "not json")?;
        out.flush()?;
    }
    if options.unsolicited_response {
        let mut out = stdout.lock();
        writeln!(out, "{}", json!({ "jsonrpc": "2.0", "id": 999, "result": {} }))?;
        out.flush()?;
    }
    if !options.exit_after_first_request {
        if let Some(code) = options.exit_code {
            std::process::exit(code);
        }
    }

    let mut counters = Counters::default();
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let Some(id) = message.get("id").cloned() else {
            counters.notifications += 1;
            continue;
        };
        if options.exit_after_first_request {
            std::process::exit(options.exit_code.unwrap_or(0));
        }
        if options.silent {
            continue;
        }

        let method = message
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let params = message.get("params").cloned();
        let reply = handle_request(&options, &mut counters, &method, params.as_ref(), &id);
        respond(&options, &stdout, &id, reply)?;
    }

    if options.ignore_close {
        loop {
            std::thread::sleep(std::time::Duration::from_secs(3600));
        }
    }
    Ok(())
}

fn handle_request(
    options: &Options,
    counters: &mut Counters,
    method: &str,
    params: Option<&Value>,
    id: &Value,
) -> Reply {
    match method {
        "initialize" => {
            if options.invalid_initialize {
                return Reply::Result(json!({ "protocolVersion": LATEST_PROTOCOL_VERSION }));
            }
            let mut capabilities = json!({});
            if options.tools {
                capabilities["tools"] = json!({});
            }
            if options.resources {
                capabilities["resources"] = json!({});
            }
            if options.prompts {
                capabilities["prompts"] = json!({});
            }
            Reply::Result(json!({
                "protocolVersion": LATEST_PROTOCOL_VERSION,
                "capabilities": capabilities,
                "serverInfo": { "name": "mock-mcp-server", "version": "1.0.0" }
            }))
        }
        "tools/list" => {
            counters.tools_list += 1;
            let tools = if options.no_tool_list_entry {
                json!([])
            } else {
                tool_definitions()
            };
            Reply::Result(json!({ "tools": tools }))
        }
        "tools/call" => call_tool(counters, params),
        "resources/list" => {
            counters.resources_list += 1;
            Reply::Result(json!({
                "resources": [
                    {
                        "uri": "file:///config.json",
                        "name": "config.json",
                        "mimeType": "application/json"
                    },
                    {
                        "uri": "file:///logo.png",
                        "name": "logo.png",
                        "mimeType": "image/png"
                    }
                ]
            }))
        }
        "resources/read" => read_resource(params),
        "prompts/list" => {
            counters.prompts_list += 1;
            Reply::Result(json!({
                "prompts": [{
                    "name": "greeting",
                    "description": "Greets someone by name",
                    "arguments": [
                        { "name": "name", "description": "Who to greet", "required": false }
                    ]
                }]
            }))
        }
        "prompts/get" => get_prompt(params),
        "probe/seq" => {
            counters.seq += 1;
            Reply::Result(json!({ "seq": counters.seq, "id": id }))
        }
        "probe/params" => {
            Reply::Result(json!({ "received": params.cloned().unwrap_or(Value::Null) }))
        }
        "probe/counts" => Reply::Result(json!({ "notifications": counters.notifications })),
        _ => Reply::Error(
            JsonRpcError::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        ),
    }
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "echo",
            "description": "Echoes the message argument back",
            "inputSchema": {
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            }
        },
        {
            "name": "add",
            "description": "Adds two numbers",
            "inputSchema": {
                "type": "object",
                "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
                "required": ["a", "b"]
            },
            "outputSchema": {
                "type": "object",
                "properties": { "sum": { "type": "number" } }
            }
        },
        {
            "name": "broken",
            "description": "Always reports a failure",
            "inputSchema": { "type": "object" }
        },
        {
            "name": "stats",
            "description": "Reports how many list requests were handled",
            "inputSchema": { "type": "object" }
        }
    ])
}

fn call_tool(counters: &Counters, params: Option<&Value>) -> Reply {
    let name = params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let arguments = params.and_then(|p| p.get("arguments"));
    match name {
        "echo" => {
            let message = arguments
                .and_then(|args| args.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("");
            Reply::Result(json!({
                "content": [{ "type": "text", "text": message }]
            }))
        }
        "add" => {
            let a = arguments
                .and_then(|args| args.get("a"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let b = arguments
                .and_then(|args| args.get("b"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let sum = a + b;
            Reply::Result(json!({
                "content": [{ "type": "text", "text": sum.to_string() }],
                "structuredContent": { "sum": sum }
            }))
        }
        "broken" => Reply::Result(json!({
            "content": [{ "type": "text", "text": "tool exploded" }],
            "isError": true
        })),
        "stats" => Reply::Result(json!({
            "content": [],
            "structuredContent": {
                "toolsList": counters.tools_list,
                "resourcesList": counters.resources_list,
                "promptsList": counters.prompts_list
            }
        })),
        _ => Reply::Error(
            JsonRpcError::INVALID_PARAMS,
            format!("Unknown tool: {name}"),
        ),
    }
}

fn read_resource(params: Option<&Value>) -> Reply {
    let uri = params
        .and_then(|p| p.get("uri"))
        .and_then(Value::as_str)
        .unwrap_or("");
    match uri {
        "file:///config.json" => Reply::Result(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "application/json",
                "text": "{\"debug\":true}"
            }]
        })),
        "file:///logo.png" => Reply::Result(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "image/png",
                "blob": "aGVsbG8="
            }]
        })),
        _ => Reply::Error(
            JsonRpcError::INVALID_PARAMS,
            format!("Unknown resource: {uri}"),
        ),
    }
}

fn get_prompt(params: Option<&Value>) -> Reply {
    let name = params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("");
    if name != "greeting" {
        return Reply::Error(
            JsonRpcError::INVALID_PARAMS,
            format!("Unknown prompt: {name}"),
        );
    }
    let who = params
        .and_then(|p| p.get("arguments"))
        .and_then(|args| args.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("world");
    Reply::Result(json!({
        "description": "Greets someone by name",
        "messages": [
            {
                "role": "user",
                "content": { "type": "text", "text": format!("Hello, {who}!") }
            },
            {
                "role": "assistant",
                "content": { "type": "text", "text": "Hi! How can I help you today?" }
            }
        ]
    }))
}

fn respond(
    options: &Options,
    stdout: &std::io::Stdout,
    id: &Value,
    reply: Reply,
) -> std::io::Result<()> {
    if options.delay_ms > 0 {
        std::thread::sleep(std::time::Duration::from_millis(options.delay_ms));
    }
    let id = if options.null_id {
        Value::Null
    } else if options.mismatched_id {
        match id.as_i64() {
            Some(id) => json!(id + 1000),
            None => id.clone(),
        }
    } else {
        id.clone()
    };

    let mut response = json!({ "jsonrpc": "2.0", "id": id });
    match reply {
        Reply::Result(result) => {
            response["result"] = result;
        }
        Reply::Error(code, message) => {
            response["error"] = json!({ "code": code, "message": message });
        }
    }
    if options.both_result_and_error && response.get("error").is_none() {
        response["error"] = json!({ "code": -32000, "message": "mock error" });
    }
    if options.missing_jsonrpc {
        if let Some(map) = response.as_object_mut() {
            map.remove("jsonrpc");
        }
    }

    let mut out = stdout.lock();
    writeln!(out, "{response}")?;
    out.flush()
}
