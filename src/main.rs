//! async-lambda - local invoke
//!
//! Runs one of the bundled demo handlers the way a serverless host would:
//! synchronously, with the event read from a file or stdin.

use async_lambda::logging::init_tracing;
use async_lambda::prelude::*;
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "async-lambda")]
#[command(about = "Invoke an async Lambda handler locally", long_about = None)]
struct Args {
    /// Function to invoke (hello, echo, stage)
    #[arg(short, long, default_value = "hello", env = "LAMBDA_FUNCTION_ID")]
    function: String,

    /// Event JSON file; reads stdin when omitted
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Request id reported in the invocation context
    #[arg(long, default_value = "local-invoke")]
    request_id: String,

    /// Pretty-print the response
    #[arg(long)]
    pretty: bool,
}

/// Greets the caller named in the event.
#[lambda_handler(name = "hello")]
async fn hello(event: Value, context: LambdaContext) -> anyhow::Result<Value> {
    let name = event
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("World");

    tracing::info!(request_id = %context.request_id, "Saying hello");
    Ok(serde_json::json!({
        "statusCode": 200,
        "body": format!("Hello, {}!", name),
    }))
}

/// Echoes the event back.
#[lambda_handler(name = "echo")]
async fn echo(event: Value, _context: LambdaContext) -> anyhow::Result<Value> {
    Ok(event)
}

/// Reports the `STAGE` setting.
#[lambda_handler(name = "stage")]
async fn stage(
    _event: Value,
    _context: LambdaContext,
    settings: Arc<BaseSettings>,
) -> anyhow::Result<Value> {
    Ok(serde_json::json!({
        "stage": settings.get("stage").unwrap_or("local"),
    }))
}

fn read_event(path: Option<&PathBuf>) -> anyhow::Result<Value> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };

    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    Ok(serde_json::from_str(&raw)?)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    let app = LambdaApp::from_env()?;
    let router = Router::new();
    router.register("hello", app.handler(HelloHandler::new())?)?;
    router.register("echo", app.handler(EchoHandler::new())?)?;
    router.register("stage", app.handler(app.with_config(StageHandler::new()))?)?;

    let event = read_event(args.event.as_ref())?;
    let context = LambdaContext::from_env(args.request_id);

    tracing::info!(function = %args.function, "Invoking");
    let response = router.dispatch(&args.function, event, context)?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", output);
    Ok(())
}
