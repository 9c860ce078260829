fn main() -> anyhow::Result<()> {
    let code = donewatch_lib::run()?;
    std::process::exit(code)
}
