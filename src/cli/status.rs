use crate::orchestrator::InstallOrchestrator;
use crate::Result;
use colored::Colorize;
use std::env;
use std::path::PathBuf;

pub async fn run(dir: Option<&str>, folder: &str, json: bool) -> Result<()> {
    let target_dir = match dir {
        Some(d) => PathBuf::from(d),
        None => env::current_dir()?,
    };

    let state = InstallOrchestrator::get_status(&target_dir, folder);

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    if !state.installed {
        println!(
            "{}",
            format!("No installation at {}", state.path.display()).yellow()
        );
        return Ok(());
    }

    println!("{}", "📦 Agent pack status".cyan().bold());
    println!();
    println!("   Path:     {}", state.path.display());
    match &state.version {
        Some(version) if version == env!("CARGO_PKG_VERSION") => {
            println!("   Version:  {}", version.green());
        }
        Some(version) => {
            println!(
                "   Version:  {} {}",
                version.yellow(),
                format!("(installer is {})", env!("CARGO_PKG_VERSION")).bright_black()
            );
        }
        None => println!("   Version:  {}", "unknown".yellow()),
    }
    println!("   Modules:  {}", state.modules.join(", "));
    if !state.custom_modules.is_empty() {
        println!("   Custom:   {}", state.custom_modules.join(", "));
    }
    if !state.ides.is_empty() {
        println!("   IDEs:     {}", state.ides.join(", "));
    }
    println!("   Tracked:  {} file(s)", state.file_count);

    Ok(())
}
