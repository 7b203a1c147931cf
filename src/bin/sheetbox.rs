use anyhow::Result;

fn main() -> Result<()> {
    sheetbox::cli::run()
}
