fn main() -> anyhow::Result<()> {
    threadscale_cli::run()
}
