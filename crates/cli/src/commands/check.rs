//! `deskclaw check` — Diagnose configuration and host dependencies.

use deskclaw_config::AppConfig;
use deskclaw_tools::ToolVersion;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("DeskClaw Check — Diagnostics");
    println!("============================\n");

    let mut issues = 0;

    match AppConfig::load() {
        Ok(config) => {
            println!("  ok   config loaded");

            if config.api_key.is_some() {
                println!("  ok   API key configured");
            } else {
                println!("  warn no API key — set ANTHROPIC_API_KEY or api_key in config.toml");
                issues += 1;
            }

            match config.tool_version.parse::<ToolVersion>() {
                Ok(version) => println!("  ok   tool version {version}"),
                Err(e) => {
                    println!("  fail {e}");
                    issues += 1;
                }
            }

            println!(
                "  ok   display {}x{}",
                config.display.width, config.display.height
            );
        }
        Err(e) => {
            println!("  fail config invalid: {e}");
            issues += 1;
        }
    }

    // The computer tool shells out to these.
    for binary in ["xdotool", "scrot", "sh"] {
        if binary_on_path(binary).await {
            println!("  ok   {binary} found");
        } else {
            println!("  warn {binary} not found — the computer tool needs it");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

async fn binary_on_path(name: &str) -> bool {
    tokio::process::Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {name}"))
        .output()
        .await
        .map(|out| out.status.success())
        .unwrap_or(false)
}
