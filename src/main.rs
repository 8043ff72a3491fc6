fn main() {
    if let Err(err) = tabular_cast::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
