fn main() -> std::process::ExitCode {
    vartik_lib::run()
}
