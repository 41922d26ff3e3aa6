use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "xtask")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run fmt+clippy
    Lint,
    /// Lint, then run the workspace tests
    Ci,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Lint => lint()?,
        Commands::Ci => {
            lint()?;
            run("cargo", &["test", "--workspace", "--all-targets"])?;
        }
    }
    Ok(())
}

fn lint() -> Result<()> {
    run("cargo", &["fmt", "--all", "--", "--check"])?;
    run("cargo", &["clippy", "--workspace", "--all-targets", "--", "-Dwarnings"])
}

fn run(cmd: &str, args: &[&str]) -> Result<()> {
    println!("+ {} {}", cmd, args.join(" "));
    let st = std::process::Command::new(cmd).args(args).status()?;
    if !st.success() {
        anyhow::bail!("{cmd} {} failed", args.join(" "))
    }
    Ok(())
}
