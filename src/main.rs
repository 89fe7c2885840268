fn main() {
    std::process::exit(rsnap::cli::run());
}
