use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), err);

    let msg = err.to_string().to_lowercase();

    if msg.contains("api key not found") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Pass a key with --api-key, or set it with:");
        eprintln!("  {} export STREAMCHAT_API_KEY=<value>", "$".dimmed());
        eprintln!("  or add it under [api_keys] deepseek in the config file.");
    }

    if msg.contains("authentication") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check that your API key is valid for this endpoint.");
    }

    if msg.contains("request failed") && !msg.contains("code") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check your internet connection and the --url setting, then try again.");
    }

    std::process::exit(1);
}
