//! Splitstat binary entry point.

fn main() -> anyhow::Result<()> {
    splitstat_cli::run()
}
