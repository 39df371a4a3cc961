fn main() {
    if let Err(err) = merge_tracker_lib::run() {
        eprintln!("merge-tracker: {err}");
        std::process::exit(1);
    }
}
