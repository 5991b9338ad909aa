fn main() -> Result<(), Box<dyn std::error::Error>> {
    switchboard::cli::main()
}
