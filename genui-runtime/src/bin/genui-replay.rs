use std::env;
use std::fs;
use std::process;
use std::sync::Arc;

use genui_runtime::{logging, Collaborators, Metrics, Role, ScriptedGenerator, Session, Telemetry};

const DEFAULT_CHUNK: usize = 16;

struct Args {
    file: String,
    chunk: usize,
    prompt: String,
}

fn parse_args() -> Result<Args, String> {
    let mut args = env::args().skip(1);
    let mut file = None;
    let mut chunk = DEFAULT_CHUNK;
    let mut prompt = "Replay captured response".to_string();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--chunk" => {
                let value = args.next().ok_or("--chunk needs a value")?;
                chunk = value
                    .parse()
                    .map_err(|_| format!("invalid chunk size '{}'", value))?;
            }
            "--prompt" => {
                prompt = args.next().ok_or("--prompt needs a value")?;
            }
            _ if file.is_none() => file = Some(arg),
            other => return Err(format!("unexpected argument '{}'", other)),
        }
    }

    Ok(Args {
        file: file.ok_or("missing response file")?,
        chunk,
        prompt,
    })
}

#[tokio::main]
async fn main() {
    logging::init_with_default("warn");

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Usage: genui-replay <response.json> [--chunk N] [--prompt TEXT]");
            eprintln!();
            eprintln!("Streams a captured model response through a session and prints the result.");
            process::exit(1);
        }
    };

    let response = match fs::read_to_string(&args.file) {
        Ok(response) => response,
        Err(e) => {
            eprintln!("✗ Failed to read {}: {}", args.file, e);
            process::exit(1);
        }
    };

    let telemetry = Arc::new(Telemetry::new());
    let mut events = telemetry.subscribe();
    let generator = ScriptedGenerator::new([response], args.chunk);
    let session = Session::new(Collaborators::new(Arc::new(generator)), telemetry);

    if let Err(e) = session.submit_prompt(&args.prompt).await {
        eprintln!("✗ Replay failed: {}", e);
        process::exit(1);
    }

    for message in session.snapshot().messages() {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        if !message.content.is_empty() {
            println!("[{}] {}", role, message.content);
        }
    }

    let Some(tree) = session.active_tree() else {
        eprintln!("✗ {} produced no UI tree", args.file);
        process::exit(1);
    };
    match serde_json::to_string_pretty(tree.as_ref()) {
        Ok(pretty) => println!("{}", pretty),
        Err(e) => eprintln!("✗ Failed to print tree: {}", e),
    }

    let plan = session.render_plan();
    let metrics = Metrics::from_events(&events.drain());
    println!();
    println!("TTFT:           {:.1} ms", metrics.ttft);
    println!("Latency:        {:.1} ms", metrics.latency);
    println!("Hallucinations: {}", metrics.hallucinations);

    if let Some(root) = plan {
        if root.stats().hallucinations() > 0 {
            process::exit(2);
        }
    }
}
