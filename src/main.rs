//! `fedorable` binary entry point.

mod cli_app;

fn main() {
    std::process::exit(cli_app::main_exit_code());
}
