fn main() {
    if let Err(err) = table_managed::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
