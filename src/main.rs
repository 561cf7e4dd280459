fn main() {
    if let Err(error) = afterglow::run() {
        log::error!("{error}");
        eprintln!("afterglow: {error}");
        std::process::exit(1);
    }
}
