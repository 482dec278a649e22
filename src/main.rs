fn main() {
    if let Err(err) = mindgraph_layout::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
