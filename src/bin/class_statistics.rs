use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    epo_harvest::apps::run_class_statistics(std::env::args().skip(1))
}
