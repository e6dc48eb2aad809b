use genui_tree::{parse_tree, plan, RenderNode, TreeError};
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: genui-validate <file.json>...");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  genui-validate ui.json");
        eprintln!("  genui-validate captures/*.json");
        process::exit(1);
    }

    let mut exit_code = 0;
    let files: Vec<_> = args[1..].to_vec();

    for file_path in files {
        match validate_file(&file_path) {
            Ok(None) => {
                println!("✓ {} is empty (nothing to render)", file_path);
            }
            Ok(Some(root)) => {
                let stats = root.stats();
                let diagnostics: Vec<&RenderNode> = root.diagnostics().collect();
                if diagnostics.is_empty() {
                    println!("✓ {} is valid ({} components)", file_path, stats.components);
                } else {
                    eprintln!(
                        "✗ {} has {} diagnostic(s) ({} components, {} invalid, {} unknown):",
                        file_path,
                        diagnostics.len(),
                        stats.components,
                        stats.invalid,
                        stats.unknown
                    );
                    for node in diagnostics {
                        print_diagnostic(node);
                    }
                    exit_code = 1;
                }
            }
            Err(e) => {
                eprintln!("✗ {} has errors:", file_path);
                eprintln!("  {}", e);
                exit_code = 1;
            }
        }
    }

    process::exit(exit_code);
}

fn validate_file(path: &str) -> Result<Option<RenderNode>, TreeError> {
    let content = fs::read_to_string(path)
        .map_err(|e| TreeError::Unparseable(format!("Failed to read file: {}", e)))?;
    let tree = parse_tree(&content)?;
    Ok(plan(&tree))
}

fn print_diagnostic(node: &RenderNode) {
    match node {
        RenderNode::Unknown { path, tag, .. } => {
            eprintln!("  Unknown component '{}' at {}", tag, path);
        }
        RenderNode::Invalid { path, error, .. } => {
            eprintln!("  Invalid node at {}:", path);
            for line in error.format().lines() {
                eprintln!("    {}", line);
            }
        }
        RenderNode::Component { .. } => {}
    }
}
