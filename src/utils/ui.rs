use colored::*;
use std::time::Instant;

pub struct DuplexUI {
    start_time: Instant,
}

impl DuplexUI {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn show_banner(&self, mode: &str) {
        // Simple, clean output like Vite
        println!(
            "\n  {} {} {}",
            "DUPLEX".bright_cyan().bold(),
            "v0.2.0".bright_white(),
            format!("building for {}", mode).bright_black()
        );
        println!();
    }

    pub fn show_completion(&self, stats: CompletionStats) {
        let build_time = self.start_time.elapsed();

        println!();
        for file in &stats.output_files {
            let size_kb = file.size as f64 / 1024.0;
            let size_str = if size_kb < 1.0 {
                format!("{:.2} B", file.size)
            } else {
                format!("{:.2} kB", size_kb)
            };

            println!(
                "  {} {} {}",
                format!("{}/", stats.out_dir).bright_black(),
                file.name.bright_cyan(),
                format!("({})", size_str).bright_black()
            );
        }

        if stats.client_references > 0 || stats.server_references > 0 {
            println!();
            println!(
                "  {} {} client references, {} server references",
                "⇄".bright_green(),
                stats.client_references.to_string().bright_cyan().bold(),
                stats.server_references.to_string().bright_cyan().bold()
            );
        }

        println!();
        println!(
            "  {} built in {}",
            "✓".bright_green(),
            format!("{:.0}ms", build_time.as_secs_f64() * 1000.0)
                .bright_white()
                .bold()
        );
    }
}

#[derive(Clone)]
pub struct CompletionStats {
    pub out_dir: String,
    pub output_files: Vec<OutputFileInfo>,
    pub client_references: usize,
    pub server_references: usize,
}

#[derive(Clone)]
pub struct OutputFileInfo {
    pub name: String,
    pub size: usize,
}

impl Default for DuplexUI {
    fn default() -> Self {
        Self::new()
    }
}
