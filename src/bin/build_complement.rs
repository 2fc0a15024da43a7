use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    epo_harvest::apps::run_build_complement(std::env::args().skip(1))
}
