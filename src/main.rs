fn main() -> std::process::ExitCode {
    cover_render_lib::run()
}
