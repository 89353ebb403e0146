fn main() {
    if let Err(err) = tourguide_lib::run() {
        log::error!("tourguide exited with error: {err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
