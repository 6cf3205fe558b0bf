use anyhow::Result;

fn main() -> Result<()> {
    guestbox::cli::run()
}
