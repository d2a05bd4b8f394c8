fn main() -> std::process::ExitCode {
    loyalbridge_console_lib::run()
}
