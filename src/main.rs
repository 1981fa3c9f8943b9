fn main() {
    std::process::exit(sable::uci::run());
}
