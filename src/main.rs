use colored::Colorize;

fn main() {
    if let Err(e) = run_sequence::run() {
        eprintln!("{} {e:?}", "Error:".red());
        std::process::exit(1);
    }
}
